use crate::sql::SqlTypeId;

/// One column of an operator's output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputColumn {
    pub name: String,
    pub type_id: SqlTypeId,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, type_id: SqlTypeId) -> Self {
        Self { name: name.into(), type_id }
    }
}

/// Ordered (name, type) pairs describing what a plan node produces.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct OutputSchema {
    columns: Vec<OutputColumn>,
}

impl OutputSchema {
    pub fn new(columns: Vec<OutputColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, idx: usize) -> &OutputColumn {
        &self.columns[idx]
    }

    /// Encoded size of one tuple laid out per this schema.
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|c| c.type_id.encoded_size()).sum()
    }

    /// Byte offset of each column inside an encoded tuple.
    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.columns.len());
        let mut cur = 0;
        for col in &self.columns {
            offsets.push(cur);
            cur += col.type_id.encoded_size();
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_layout() {
        let schema = OutputSchema::new(vec![
            OutputColumn::new("a", SqlTypeId::Integer),
            OutputColumn::new("b", SqlTypeId::Boolean),
            OutputColumn::new("c", SqlTypeId::Decimal),
        ]);
        assert_eq!(schema.tuple_size(), 9 + 2 + 9);
        assert_eq!(schema.offsets(), vec![0, 9, 11]);
    }
}

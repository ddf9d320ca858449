// Projected Columns Iterator
//
// A cursor over one vector of rows with a projected column subset. Supports
// unfiltered iteration, building a selection vector through match/filter
// calls, and filtered iteration over the survivors.

use crate::sql::{SqlTypeId, SqlValue};

/// One decoded vector of rows, column-major.
#[derive(Debug, Clone)]
pub struct ProjectedColumns {
    types: Vec<SqlTypeId>,
    columns: Vec<Vec<SqlValue>>,
    num_rows: usize,
}

impl ProjectedColumns {
    pub fn new(types: Vec<SqlTypeId>) -> Self {
        let columns = types.iter().map(|_| Vec::new()).collect();
        Self { types, columns, num_rows: 0 }
    }

    pub fn push_row(&mut self, values: Vec<SqlValue>) {
        debug_assert_eq!(values.len(), self.columns.len());
        for (col, value) in self.columns.iter_mut().zip(values) {
            col.push(value);
        }
        self.num_rows += 1;
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn types(&self) -> &[SqlTypeId] {
        &self.types
    }

    pub fn value(&self, col: usize, row: usize) -> &SqlValue {
        &self.columns[col][row]
    }
}

#[derive(Debug)]
pub struct ProjectedColumnsIterator {
    pc: ProjectedColumns,
    /// Position in unfiltered iteration, or index into the selection vector
    /// in filtered iteration.
    pos: usize,
    selection: Option<Vec<u32>>,
    /// Matches collected by `match_row` during the current pass.
    pending_matches: Vec<u32>,
}

impl ProjectedColumnsIterator {
    pub fn new(pc: ProjectedColumns) -> Self {
        Self {
            pc,
            pos: 0,
            selection: None,
            pending_matches: Vec::new(),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.selection.is_some()
    }

    pub fn num_rows(&self) -> usize {
        self.pc.num_rows()
    }

    /// Rows surviving the selection vector, or all rows when unfiltered.
    pub fn num_selected(&self) -> usize {
        match &self.selection {
            Some(sel) => sel.len(),
            None => self.pc.num_rows(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.pc.num_rows()
    }

    pub fn advance(&mut self) -> bool {
        self.pos += 1;
        self.has_next()
    }

    pub fn has_next_filtered(&self) -> bool {
        match &self.selection {
            Some(sel) => self.pos < sel.len(),
            None => self.has_next(),
        }
    }

    pub fn advance_filtered(&mut self) -> bool {
        self.pos += 1;
        self.has_next_filtered()
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.pending_matches.clear();
    }

    /// Finish a match pass: the collected matches become the selection
    /// vector and the cursor rewinds.
    pub fn reset_filtered(&mut self) {
        self.selection = Some(std::mem::take(&mut self.pending_matches));
        self.pos = 0;
    }

    fn current_row(&self) -> usize {
        match &self.selection {
            Some(sel) => sel[self.pos] as usize,
            None => self.pos,
        }
    }

    /// Record whether the current row survives a scalar predicate.
    pub fn match_row(&mut self, matched: bool) {
        if matched {
            self.pending_matches.push(self.current_row() as u32);
        }
    }

    /// Current value of `col`.
    pub fn get(&self, col: usize) -> &SqlValue {
        self.pc.value(col, self.current_row())
    }

    /// Vectorized comparison filter: restrict the selection to rows whose
    /// `col` satisfies `op` against `rhs`. Returns the surviving count.
    pub fn filter_compare(&mut self, col: usize, op: crate::plan::CompareOp, rhs: &SqlValue) -> usize {
        use crate::plan::CompareOp;
        let candidates: Vec<u32> = match self.selection.take() {
            Some(sel) => sel,
            None => (0..self.pc.num_rows() as u32).collect(),
        };
        let survivors: Vec<u32> = candidates
            .into_iter()
            .filter(|&row| {
                let lhs = self.pc.value(col, row as usize);
                if lhs.is_null() || rhs.is_null() {
                    return false;
                }
                match (op, lhs.partial_cmp(rhs)) {
                    (CompareOp::Eq, Some(ord)) => ord == std::cmp::Ordering::Equal,
                    (CompareOp::Ne, Some(ord)) => ord != std::cmp::Ordering::Equal,
                    (CompareOp::Lt, Some(ord)) => ord == std::cmp::Ordering::Less,
                    (CompareOp::Le, Some(ord)) => ord != std::cmp::Ordering::Greater,
                    (CompareOp::Gt, Some(ord)) => ord == std::cmp::Ordering::Greater,
                    (CompareOp::Ge, Some(ord)) => ord != std::cmp::Ordering::Less,
                    (_, None) => false,
                }
            })
            .collect();
        let count = survivors.len();
        self.selection = Some(survivors);
        self.pos = 0;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::CompareOp;

    fn int_vector(values: &[i64]) -> ProjectedColumnsIterator {
        let mut pc = ProjectedColumns::new(vec![SqlTypeId::Integer]);
        for &v in values {
            pc.push_row(vec![SqlValue::integer(v)]);
        }
        ProjectedColumnsIterator::new(pc)
    }

    #[test]
    fn test_unfiltered_iteration() {
        let mut pci = int_vector(&[10, 20, 30]);
        let mut seen = Vec::new();
        while pci.has_next() {
            seen.push(pci.get(0).as_integer().unwrap());
            pci.advance();
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn test_vectorized_filter() {
        let mut pci = int_vector(&[1, 5, 5, 9]);
        let count = pci.filter_compare(0, CompareOp::Eq, &SqlValue::integer(5));
        assert_eq!(count, 2);
        assert!(pci.is_filtered());

        let mut seen = Vec::new();
        while pci.has_next_filtered() {
            seen.push(pci.get(0).as_integer().unwrap());
            pci.advance_filtered();
        }
        assert_eq!(seen, vec![5, 5]);
    }

    #[test]
    fn test_match_then_reset_filtered() {
        let mut pci = int_vector(&[1, 2, 3, 4]);
        while pci.has_next() {
            let even = pci.get(0).as_integer().unwrap() % 2 == 0;
            pci.match_row(even);
            pci.advance();
        }
        pci.reset_filtered();
        assert_eq!(pci.num_selected(), 2);
        assert_eq!(pci.get(0).as_integer(), Some(2));
    }

    #[test]
    fn test_stacked_filters_narrow_selection() {
        let mut pci = int_vector(&[1, 2, 3, 4, 5, 6]);
        pci.filter_compare(0, CompareOp::Gt, &SqlValue::integer(2));
        let count = pci.filter_compare(0, CompareOp::Le, &SqlValue::integer(5));
        assert_eq!(count, 3);
    }

    #[test]
    fn test_null_rows_never_match() {
        let mut pc = ProjectedColumns::new(vec![SqlTypeId::Integer]);
        pc.push_row(vec![SqlValue::integer(1)]);
        pc.push_row(vec![SqlValue::null_of(SqlTypeId::Integer)]);
        let mut pci = ProjectedColumnsIterator::new(pc);
        let count = pci.filter_compare(0, CompareOp::Ge, &SqlValue::integer(0));
        assert_eq!(count, 1);
    }
}

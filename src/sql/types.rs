use std::fmt;

/// SQL column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SqlTypeId {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Boolean,
    Decimal,
    Date,
    Varchar,
}

/// Payload window reserved for an encoded varchar.
pub const VARCHAR_WINDOW: usize = 60;

impl SqlTypeId {
    /// Size in bytes of one encoded value of this type: a null byte plus the
    /// fixed payload.
    pub fn encoded_size(self) -> usize {
        match self {
            SqlTypeId::TinyInt | SqlTypeId::SmallInt | SqlTypeId::Integer | SqlTypeId::BigInt => 1 + 8,
            SqlTypeId::Boolean => 1 + 1,
            SqlTypeId::Decimal => 1 + 8,
            SqlTypeId::Date => 1 + 4,
            SqlTypeId::Varchar => 1 + 4 + VARCHAR_WINDOW,
        }
    }

    /// Whether values of this type are carried as a SQL integer at runtime.
    pub fn is_integer_family(self) -> bool {
        matches!(
            self,
            SqlTypeId::TinyInt | SqlTypeId::SmallInt | SqlTypeId::Integer | SqlTypeId::BigInt
        )
    }
}

impl fmt::Display for SqlTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlTypeId::TinyInt => "TINYINT",
            SqlTypeId::SmallInt => "SMALLINT",
            SqlTypeId::Integer => "INTEGER",
            SqlTypeId::BigInt => "BIGINT",
            SqlTypeId::Boolean => "BOOLEAN",
            SqlTypeId::Decimal => "DECIMAL",
            SqlTypeId::Date => "DATE",
            SqlTypeId::Varchar => "VARCHAR",
        };
        write!(f, "{}", name)
    }
}

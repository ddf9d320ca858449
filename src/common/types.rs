use std::fmt;

/// Number of rows in one projected vector handed to operators.
pub const VECTOR_SIZE: usize = 2048;

/// Transaction timestamp type
pub type Timestamp = u64;

/// Slot of a tuple inside a table
pub type TupleSlot = u32;

macro_rules! define_oid {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u32 {
            fn from(oid: $name) -> u32 {
                oid.0
            }
        }
    };
}

define_oid!(
    /// Database object identifier
    DbOid
);
define_oid!(
    /// Namespace object identifier
    NamespaceOid
);
define_oid!(
    /// Table object identifier
    TableOid
);
define_oid!(
    /// Index object identifier
    IndexOid
);
define_oid!(
    /// Column object identifier
    ColOid
);

/// Composite identifier for an index, unique across databases and namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId {
    pub db_oid: DbOid,
    pub ns_oid: NamespaceOid,
    pub index_oid: IndexOid,
}

impl IndexId {
    pub fn new(db_oid: DbOid, ns_oid: NamespaceOid, index_oid: IndexOid) -> Self {
        Self { db_oid, ns_oid, index_oid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_identity() {
        let a = TableOid(42);
        let b = TableOid(42);
        assert_eq!(a, b);
        assert_eq!(u32::from(a), 42);
    }

    #[test]
    fn test_index_id_hashable() {
        use std::collections::HashMap;
        let id = IndexId::new(DbOid(1), NamespaceOid(2), IndexOid(3));
        let mut m = HashMap::new();
        m.insert(id, true);
        assert_eq!(m.get(&id), Some(&true));
    }
}

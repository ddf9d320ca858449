// DSL Type Universe
//
// A closed family of intrinsic kinds plus pointer, function, array and struct
// derivations. Types are interned: the same kind always yields the same
// `TypeRef`, so handle equality is type identity.

use std::collections::HashMap;

/// Handle to an interned type inside one `TypeContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(u32);

/// The closed enumeration of builtin kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BuiltinKind {
    // Native primitives
    Bool,
    Nil,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    // SQL value types
    Boolean,
    Integer,
    Real,
    Date,
    StringVal,
    // Aggregators
    CountAggregate,
    CountStarAggregate,
    IntegerSumAggregate,
    IntegerAvgAggregate,
    IntegerMinAggregate,
    IntegerMaxAggregate,
    // Opaque engine containers
    ProjectedColumnsIterator,
    TableVectorIterator,
    IndexIterator,
    JoinHashTable,
    JoinHashTableIterator,
    AggregationHashTable,
    AggregationHashTableIterator,
    AggOverflowPartIter,
    Sorter,
    SorterIterator,
    FilterManager,
    MemoryPool,
    ThreadStateContainer,
    ExecutionContext,
}

impl BuiltinKind {
    pub const ALL: &'static [BuiltinKind] = &[
        BuiltinKind::Bool,
        BuiltinKind::Nil,
        BuiltinKind::Int8,
        BuiltinKind::Int16,
        BuiltinKind::Int32,
        BuiltinKind::Int64,
        BuiltinKind::Uint8,
        BuiltinKind::Uint16,
        BuiltinKind::Uint32,
        BuiltinKind::Uint64,
        BuiltinKind::Float32,
        BuiltinKind::Float64,
        BuiltinKind::Boolean,
        BuiltinKind::Integer,
        BuiltinKind::Real,
        BuiltinKind::Date,
        BuiltinKind::StringVal,
        BuiltinKind::CountAggregate,
        BuiltinKind::CountStarAggregate,
        BuiltinKind::IntegerSumAggregate,
        BuiltinKind::IntegerAvgAggregate,
        BuiltinKind::IntegerMinAggregate,
        BuiltinKind::IntegerMaxAggregate,
        BuiltinKind::ProjectedColumnsIterator,
        BuiltinKind::TableVectorIterator,
        BuiltinKind::IndexIterator,
        BuiltinKind::JoinHashTable,
        BuiltinKind::JoinHashTableIterator,
        BuiltinKind::AggregationHashTable,
        BuiltinKind::AggregationHashTableIterator,
        BuiltinKind::AggOverflowPartIter,
        BuiltinKind::Sorter,
        BuiltinKind::SorterIterator,
        BuiltinKind::FilterManager,
        BuiltinKind::MemoryPool,
        BuiltinKind::ThreadStateContainer,
        BuiltinKind::ExecutionContext,
    ];

    /// DSL-level spelling, also used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Bool => "bool",
            BuiltinKind::Nil => "nil",
            BuiltinKind::Int8 => "int8",
            BuiltinKind::Int16 => "int16",
            BuiltinKind::Int32 => "int32",
            BuiltinKind::Int64 => "int64",
            BuiltinKind::Uint8 => "uint8",
            BuiltinKind::Uint16 => "uint16",
            BuiltinKind::Uint32 => "uint32",
            BuiltinKind::Uint64 => "uint64",
            BuiltinKind::Float32 => "float32",
            BuiltinKind::Float64 => "float64",
            BuiltinKind::Boolean => "Boolean",
            BuiltinKind::Integer => "Integer",
            BuiltinKind::Real => "Real",
            BuiltinKind::Date => "Date",
            BuiltinKind::StringVal => "StringVal",
            BuiltinKind::CountAggregate => "CountAggregate",
            BuiltinKind::CountStarAggregate => "CountStarAggregate",
            BuiltinKind::IntegerSumAggregate => "IntegerSumAggregate",
            BuiltinKind::IntegerAvgAggregate => "IntegerAvgAggregate",
            BuiltinKind::IntegerMinAggregate => "IntegerMinAggregate",
            BuiltinKind::IntegerMaxAggregate => "IntegerMaxAggregate",
            BuiltinKind::ProjectedColumnsIterator => "ProjectedColumnsIterator",
            BuiltinKind::TableVectorIterator => "TableVectorIterator",
            BuiltinKind::IndexIterator => "IndexIterator",
            BuiltinKind::JoinHashTable => "JoinHashTable",
            BuiltinKind::JoinHashTableIterator => "JoinHashTableIterator",
            BuiltinKind::AggregationHashTable => "AggregationHashTable",
            BuiltinKind::AggregationHashTableIterator => "AggregationHashTableIterator",
            BuiltinKind::AggOverflowPartIter => "AggOverflowPartIter",
            BuiltinKind::Sorter => "Sorter",
            BuiltinKind::SorterIterator => "SorterIterator",
            BuiltinKind::FilterManager => "FilterManager",
            BuiltinKind::MemoryPool => "MemoryPool",
            BuiltinKind::ThreadStateContainer => "ThreadStateContainer",
            BuiltinKind::ExecutionContext => "ExecutionContext",
        }
    }

    pub fn by_name(name: &str) -> Option<BuiltinKind> {
        BuiltinKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn is_sql_value(self) -> bool {
        matches!(
            self,
            BuiltinKind::Boolean | BuiltinKind::Integer | BuiltinKind::Real | BuiltinKind::Date | BuiltinKind::StringVal
        )
    }

    pub fn is_aggregator(self) -> bool {
        matches!(
            self,
            BuiltinKind::CountAggregate
                | BuiltinKind::CountStarAggregate
                | BuiltinKind::IntegerSumAggregate
                | BuiltinKind::IntegerAvgAggregate
                | BuiltinKind::IntegerMinAggregate
                | BuiltinKind::IntegerMaxAggregate
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BuiltinKind::Int8
                | BuiltinKind::Int16
                | BuiltinKind::Int32
                | BuiltinKind::Int64
                | BuiltinKind::Uint8
                | BuiltinKind::Uint16
                | BuiltinKind::Uint32
                | BuiltinKind::Uint64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BuiltinKind::Float32 | BuiltinKind::Float64)
    }
}

/// Structural description of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Builtin(BuiltinKind),
    Pointer(TypeRef),
    Array(TypeRef),
    Function { params: Vec<TypeRef>, ret: TypeRef },
    Struct { name: String, fields: Vec<(String, TypeRef)> },
    StringLiteral,
}

/// Owns and uniques every type created during one compilation.
pub struct TypeContext {
    kinds: Vec<TypeKind>,
    interned: HashMap<TypeKind, TypeRef>,
    builtin_cache: HashMap<BuiltinKind, TypeRef>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            kinds: Vec::new(),
            interned: HashMap::new(),
            builtin_cache: HashMap::new(),
        };
        for &kind in BuiltinKind::ALL {
            let r = ctx.intern(TypeKind::Builtin(kind));
            ctx.builtin_cache.insert(kind, r);
        }
        ctx
    }

    fn intern(&mut self, kind: TypeKind) -> TypeRef {
        if let Some(&r) = self.interned.get(&kind) {
            return r;
        }
        let r = TypeRef(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.interned.insert(kind, r);
        r
    }

    pub fn builtin(&self, kind: BuiltinKind) -> TypeRef {
        self.builtin_cache[&kind]
    }

    pub fn pointer_to(&mut self, base: TypeRef) -> TypeRef {
        self.intern(TypeKind::Pointer(base))
    }

    pub fn array_of(&mut self, elem: TypeRef) -> TypeRef {
        self.intern(TypeKind::Array(elem))
    }

    pub fn function(&mut self, params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
        self.intern(TypeKind::Function { params, ret })
    }

    pub fn struct_type(&mut self, name: String, fields: Vec<(String, TypeRef)>) -> TypeRef {
        self.intern(TypeKind::Struct { name, fields })
    }

    pub fn string_literal(&mut self) -> TypeRef {
        self.intern(TypeKind::StringLiteral)
    }

    pub fn kind(&self, r: TypeRef) -> &TypeKind {
        &self.kinds[r.0 as usize]
    }

    pub fn is_specific_builtin(&self, r: TypeRef, kind: BuiltinKind) -> bool {
        r == self.builtin(kind)
    }

    pub fn is_sql_value(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Builtin(k) if k.is_sql_value())
    }

    pub fn is_aggregator(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Builtin(k) if k.is_aggregator())
    }

    pub fn is_integer(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Builtin(k) if k.is_integer())
    }

    pub fn is_float(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Builtin(k) if k.is_float())
    }

    pub fn is_bool(&self, r: TypeRef) -> bool {
        self.is_specific_builtin(r, BuiltinKind::Bool)
    }

    pub fn is_nil(&self, r: TypeRef) -> bool {
        self.is_specific_builtin(r, BuiltinKind::Nil)
    }

    pub fn is_pointer(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Pointer(_))
    }

    pub fn is_function(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::Function { .. })
    }

    pub fn is_string(&self, r: TypeRef) -> bool {
        matches!(self.kind(r), TypeKind::StringLiteral)
    }

    /// Base type when `r` is a pointer, otherwise none.
    pub fn pointee(&self, r: TypeRef) -> Option<TypeRef> {
        match self.kind(r) {
            TypeKind::Pointer(base) => Some(*base),
            _ => None,
        }
    }

    pub fn function_shape(&self, r: TypeRef) -> Option<(&[TypeRef], TypeRef)> {
        match self.kind(r) {
            TypeKind::Function { params, ret } => Some((params, *ret)),
            _ => None,
        }
    }

    pub fn struct_fields(&self, r: TypeRef) -> Option<&[(String, TypeRef)]> {
        match self.kind(r) {
            TypeKind::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Printable spelling for diagnostics.
    pub fn display(&self, r: TypeRef) -> String {
        match self.kind(r) {
            TypeKind::Builtin(k) => k.name().to_string(),
            TypeKind::Pointer(base) => format!("*{}", self.display(*base)),
            TypeKind::Array(elem) => format!("[]{}", self.display(*elem)),
            TypeKind::Function { params, ret } => {
                let params = params.iter().map(|p| self.display(*p)).collect::<Vec<_>>().join(", ");
                format!("fn({}) -> {}", params, self.display(*ret))
            }
            TypeKind::Struct { name, .. } => name.clone(),
            TypeKind::StringLiteral => "string".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types_are_uniqued() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.builtin(BuiltinKind::Integer), ctx.builtin(BuiltinKind::Integer));
        assert_ne!(ctx.builtin(BuiltinKind::Integer), ctx.builtin(BuiltinKind::Real));
    }

    #[test]
    fn test_derived_types_are_uniqued() {
        let mut ctx = TypeContext::new();
        let u8_ty = ctx.builtin(BuiltinKind::Uint8);
        let p1 = ctx.pointer_to(u8_ty);
        let p2 = ctx.pointer_to(u8_ty);
        assert_eq!(p1, p2);
        assert_eq!(ctx.pointee(p1), Some(u8_ty));

        let i32_ty = ctx.builtin(BuiltinKind::Int32);
        let f1 = ctx.function(vec![p1, p1], i32_ty);
        let f2 = ctx.function(vec![p1, p1], i32_ty);
        assert_eq!(f1, f2);
        assert!(ctx.is_function(f1));
    }

    #[test]
    fn test_predicates() {
        let mut ctx = TypeContext::new();
        assert!(ctx.is_sql_value(ctx.builtin(BuiltinKind::Boolean)));
        assert!(!ctx.is_sql_value(ctx.builtin(BuiltinKind::Bool)));
        assert!(ctx.is_aggregator(ctx.builtin(BuiltinKind::CountAggregate)));
        assert!(ctx.is_integer(ctx.builtin(BuiltinKind::Uint64)));
        assert!(ctx.is_float(ctx.builtin(BuiltinKind::Float32)));
        let nil = ctx.builtin(BuiltinKind::Nil);
        assert!(ctx.is_nil(nil));
        assert_eq!(ctx.pointee(nil), None);
        let s = ctx.string_literal();
        assert!(ctx.is_string(s));
    }

    #[test]
    fn test_display() {
        let mut ctx = TypeContext::new();
        let pci = ctx.builtin(BuiltinKind::ProjectedColumnsIterator);
        let ptr = ctx.pointer_to(pci);
        assert_eq!(ctx.display(ptr), "*ProjectedColumnsIterator");
        let b = ctx.builtin(BuiltinKind::Bool);
        let f = ctx.function(vec![ptr], b);
        assert_eq!(ctx.display(f), "fn(*ProjectedColumnsIterator) -> bool");
    }
}

// DSL Intrinsics
//
// The closed set of built-in functions the code generator may emit. The
// semantic analyzer hard-codes a calling contract for each one; anything the
// runtime can do is reachable only through this list.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Every intrinsic recognized by the semantic analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // SQL value conversions
    BoolToSql,
    IntToSql,
    FloatToSql,
    SqlToBool,

    // Vectorized filter comparisons over a projected-columns iterator
    FilterEq,
    FilterNe,
    FilterLt,
    FilterLe,
    FilterGt,
    FilterGe,

    // Execution context
    ExecCtxGetMemoryPool,

    // Thread state container
    TlsInit,
    TlsReset,
    TlsIterate,
    TlsFree,

    // Table vector iterator
    TableIterInit,
    TableIterAdvance,
    TableIterGetPci,
    TableIterClose,
    TableIterParallel,

    // Projected columns iterator
    PciIsFiltered,
    PciHasNext,
    PciHasNextFiltered,
    PciAdvance,
    PciAdvanceFiltered,
    PciMatch,
    PciReset,
    PciResetFiltered,
    PciGetSmallInt,
    PciGetInt,
    PciGetBigInt,
    PciGetReal,
    PciGetDouble,

    // Hashing
    Hash,

    // Filter manager
    FilterManagerInit,
    FilterManagerInsertFilter,
    FilterManagerFinalize,
    FilterManagerRunFilters,
    FilterManagerFree,

    // Aggregation hash table
    AggHashTableInit,
    AggHashTableInsert,
    AggHashTableLookup,
    AggHashTableProcessBatch,
    AggHashTableMovePartitions,
    AggHashTableParallelPartitionedScan,
    AggHashTableFree,

    // Aggregation hash table iterator
    AggHashTableIterInit,
    AggHashTableIterHasNext,
    AggHashTableIterNext,
    AggHashTableIterGetRow,
    AggHashTableIterClose,

    // Aggregation overflow partition iterator
    AggPartIterHasNext,
    AggPartIterNext,
    AggPartIterGetRow,
    AggPartIterGetHash,

    // Aggregators
    AggInit,
    AggAdvance,
    AggMerge,
    AggReset,
    AggResult,

    // Join hash table
    JoinHashTableInit,
    JoinHashTableInsert,
    JoinHashTableBuild,
    JoinHashTableBuildParallel,
    JoinHashTableFree,

    // Join hash table iterator
    JoinHashTableIterInit,
    JoinHashTableIterHasNext,
    JoinHashTableIterGetRow,
    JoinHashTableIterClose,

    // Sorter
    SorterInit,
    SorterInsert,
    SorterSort,
    SorterSortParallel,
    SorterSortTopKParallel,
    SorterFree,

    // Sorter iterator
    SorterIterInit,
    SorterIterHasNext,
    SorterIterNext,
    SorterIterGetRow,
    SorterIterClose,

    // Output buffer
    OutputAlloc,
    OutputAdvance,
    OutputSetNull,
    OutputFinalize,

    // Tuple insertion
    Insert,

    // Index iterator
    IndexIteratorInit,
    IndexIteratorScanKey,
    IndexIteratorAdvance,
    IndexIteratorGetSmallInt,
    IndexIteratorGetInt,
    IndexIteratorGetBigInt,
    IndexIteratorGetReal,
    IndexIteratorGetDouble,
    IndexIteratorFree,

    // Trig
    ACos,
    ASin,
    ATan,
    ATan2,
    Cos,
    Cot,
    Sin,
    Tan,

    // Misc
    SizeOf,
    PtrCast,
}

/// Name/intrinsic pairs, in the order the analyzer documents them.
pub const BUILTIN_NAMES: &[(Builtin, &str)] = &[
    (Builtin::BoolToSql, "boolToSql"),
    (Builtin::IntToSql, "intToSql"),
    (Builtin::FloatToSql, "floatToSql"),
    (Builtin::SqlToBool, "sqlToBool"),
    (Builtin::FilterEq, "filterEq"),
    (Builtin::FilterNe, "filterNe"),
    (Builtin::FilterLt, "filterLt"),
    (Builtin::FilterLe, "filterLe"),
    (Builtin::FilterGt, "filterGt"),
    (Builtin::FilterGe, "filterGe"),
    (Builtin::ExecCtxGetMemoryPool, "execCtxGetMem"),
    (Builtin::TlsInit, "tlsInit"),
    (Builtin::TlsReset, "tlsReset"),
    (Builtin::TlsIterate, "tlsIterate"),
    (Builtin::TlsFree, "tlsFree"),
    (Builtin::TableIterInit, "tableIterInit"),
    (Builtin::TableIterAdvance, "tableIterAdvance"),
    (Builtin::TableIterGetPci, "tableIterGetPCI"),
    (Builtin::TableIterClose, "tableIterClose"),
    (Builtin::TableIterParallel, "iterateTableParallel"),
    (Builtin::PciIsFiltered, "pciIsFiltered"),
    (Builtin::PciHasNext, "pciHasNext"),
    (Builtin::PciHasNextFiltered, "pciHasNextFiltered"),
    (Builtin::PciAdvance, "pciAdvance"),
    (Builtin::PciAdvanceFiltered, "pciAdvanceFiltered"),
    (Builtin::PciMatch, "pciMatch"),
    (Builtin::PciReset, "pciReset"),
    (Builtin::PciResetFiltered, "pciResetFiltered"),
    (Builtin::PciGetSmallInt, "pciGetSmallInt"),
    (Builtin::PciGetInt, "pciGetInt"),
    (Builtin::PciGetBigInt, "pciGetBigInt"),
    (Builtin::PciGetReal, "pciGetReal"),
    (Builtin::PciGetDouble, "pciGetDouble"),
    (Builtin::Hash, "hash"),
    (Builtin::FilterManagerInit, "filterManagerInit"),
    (Builtin::FilterManagerInsertFilter, "filterManagerInsertFilter"),
    (Builtin::FilterManagerFinalize, "filterManagerFinalize"),
    (Builtin::FilterManagerRunFilters, "filtersRun"),
    (Builtin::FilterManagerFree, "filterManagerFree"),
    (Builtin::AggHashTableInit, "aggHTInit"),
    (Builtin::AggHashTableInsert, "aggHTInsert"),
    (Builtin::AggHashTableLookup, "aggHTLookup"),
    (Builtin::AggHashTableProcessBatch, "aggHTProcessBatch"),
    (Builtin::AggHashTableMovePartitions, "aggHTMoveParts"),
    (Builtin::AggHashTableParallelPartitionedScan, "aggHTParallelPartScan"),
    (Builtin::AggHashTableFree, "aggHTFree"),
    (Builtin::AggHashTableIterInit, "aggHTIterInit"),
    (Builtin::AggHashTableIterHasNext, "aggHTIterHasNext"),
    (Builtin::AggHashTableIterNext, "aggHTIterNext"),
    (Builtin::AggHashTableIterGetRow, "aggHTIterGetRow"),
    (Builtin::AggHashTableIterClose, "aggHTIterClose"),
    (Builtin::AggPartIterHasNext, "aggPartIterHasNext"),
    (Builtin::AggPartIterNext, "aggPartIterNext"),
    (Builtin::AggPartIterGetRow, "aggPartIterGetRow"),
    (Builtin::AggPartIterGetHash, "aggPartIterGetHash"),
    (Builtin::AggInit, "aggInit"),
    (Builtin::AggAdvance, "aggAdvance"),
    (Builtin::AggMerge, "aggMerge"),
    (Builtin::AggReset, "aggReset"),
    (Builtin::AggResult, "aggResult"),
    (Builtin::JoinHashTableInit, "joinHTInit"),
    (Builtin::JoinHashTableInsert, "joinHTInsert"),
    (Builtin::JoinHashTableBuild, "joinHTBuild"),
    (Builtin::JoinHashTableBuildParallel, "joinHTBuildParallel"),
    (Builtin::JoinHashTableFree, "joinHTFree"),
    (Builtin::JoinHashTableIterInit, "joinHTIterInit"),
    (Builtin::JoinHashTableIterHasNext, "joinHTIterHasNext"),
    (Builtin::JoinHashTableIterGetRow, "joinHTIterGetRow"),
    (Builtin::JoinHashTableIterClose, "joinHTIterClose"),
    (Builtin::SorterInit, "sorterInit"),
    (Builtin::SorterInsert, "sorterInsert"),
    (Builtin::SorterSort, "sorterSort"),
    (Builtin::SorterSortParallel, "sorterSortParallel"),
    (Builtin::SorterSortTopKParallel, "sorterSortTopKParallel"),
    (Builtin::SorterFree, "sorterFree"),
    (Builtin::SorterIterInit, "sorterIterInit"),
    (Builtin::SorterIterHasNext, "sorterIterHasNext"),
    (Builtin::SorterIterNext, "sorterIterNext"),
    (Builtin::SorterIterGetRow, "sorterIterGetRow"),
    (Builtin::SorterIterClose, "sorterIterClose"),
    (Builtin::OutputAlloc, "outputAlloc"),
    (Builtin::OutputAdvance, "outputAdvance"),
    (Builtin::OutputSetNull, "outputSetNull"),
    (Builtin::OutputFinalize, "outputFinalize"),
    (Builtin::Insert, "insert"),
    (Builtin::IndexIteratorInit, "indexIteratorInit"),
    (Builtin::IndexIteratorScanKey, "indexIteratorScanKey"),
    (Builtin::IndexIteratorAdvance, "indexIteratorAdvance"),
    (Builtin::IndexIteratorGetSmallInt, "indexIteratorGetSmallInt"),
    (Builtin::IndexIteratorGetInt, "indexIteratorGetInt"),
    (Builtin::IndexIteratorGetBigInt, "indexIteratorGetBigInt"),
    (Builtin::IndexIteratorGetReal, "indexIteratorGetReal"),
    (Builtin::IndexIteratorGetDouble, "indexIteratorGetDouble"),
    (Builtin::IndexIteratorFree, "indexIteratorFree"),
    (Builtin::ACos, "acos"),
    (Builtin::ASin, "asin"),
    (Builtin::ATan, "atan"),
    (Builtin::ATan2, "atan2"),
    (Builtin::Cos, "cos"),
    (Builtin::Cot, "cot"),
    (Builtin::Sin, "sin"),
    (Builtin::Tan, "tan"),
    (Builtin::SizeOf, "sizeOf"),
    (Builtin::PtrCast, "ptrCast"),
];

static NAME_TO_BUILTIN: Lazy<HashMap<&'static str, Builtin>> =
    Lazy::new(|| BUILTIN_NAMES.iter().map(|&(b, n)| (n, b)).collect());

static BUILTIN_TO_NAME: Lazy<HashMap<Builtin, &'static str>> =
    Lazy::new(|| BUILTIN_NAMES.iter().map(|&(b, n)| (b, n)).collect());

impl Builtin {
    /// Look up an intrinsic by its DSL name.
    pub fn by_name(name: &str) -> Option<Builtin> {
        NAME_TO_BUILTIN.get(name).copied()
    }

    /// DSL-level name of this intrinsic.
    pub fn name(self) -> &'static str {
        BUILTIN_TO_NAME[&self]
    }
}

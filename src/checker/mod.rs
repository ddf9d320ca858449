// Output Checker Framework
//
// Validates tuple batches emitted by a compiled plan: counts, per-row
// comparisons, join equalities, sums, and sort order, plus a fan-out over
// child checkers. `OutputStore` bridges the raw output callback to a checker
// by decoding tuples per the plan's output schema.

pub mod output_checker;
pub mod output_store;

pub use output_checker::{
    CheckFailure, GenericChecker, MultiChecker, NumChecker, OutputChecker, SingleIntComparisonChecker,
    SingleIntJoinChecker, SingleIntSortChecker, SingleIntSumChecker,
};
pub use output_store::{MultiOutputCallback, OutputStore};

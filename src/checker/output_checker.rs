// Output Checkers
//
// Each checker consumes decoded tuple batches and verifies one property of
// the query's output. Checks are fallible rather than asserting so callers
// decide how a violation surfaces.

use thiserror::Error;

use crate::sql::SqlValue;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckFailure {
    #[error("expected {expected} output tuples, saw {actual}")]
    WrongCount { expected: i64, actual: i64 },
    #[error("row {row}: comparison failed for value {value:?}")]
    ComparisonFailed { row: usize, value: Option<i64> },
    #[error("row {row}: join columns differ ({left:?} vs {right:?})")]
    JoinMismatch {
        row: usize,
        left: Option<i64>,
        right: Option<i64>,
    },
    #[error("expected column sum {expected}, saw {actual}")]
    WrongSum { expected: i64, actual: i64 },
    #[error("row {row}: sort order violated ({prev:?} then {current:?})")]
    OutOfOrder {
        row: usize,
        prev: Option<i64>,
        current: Option<i64>,
    },
    #[error("column {col} is not an integer column")]
    NotAnIntegerColumn { col: usize },
    #[error("{0}")]
    Custom(String),
}

/// A consumer of output batches with a final correctness verdict.
pub trait OutputChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure>;
    fn check_correctness(&self) -> Result<(), CheckFailure>;
}

fn int_at(row: &[SqlValue], col: usize) -> Result<Option<i64>, CheckFailure> {
    match row.get(col) {
        Some(SqlValue::Integer { is_null: true, .. }) => Ok(None),
        Some(SqlValue::Integer { val, .. }) => Ok(Some(*val)),
        _ => Err(CheckFailure::NotAnIntegerColumn { col }),
    }
}

/// Checks the total number of output tuples.
pub struct NumChecker {
    expected: i64,
    seen: i64,
}

impl NumChecker {
    pub fn new(expected: i64) -> Self {
        Self { expected, seen: 0 }
    }
}

impl OutputChecker for NumChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        self.seen += output.len() as i64;
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        if self.seen == self.expected {
            Ok(())
        } else {
            Err(CheckFailure::WrongCount { expected: self.expected, actual: self.seen })
        }
    }
}

/// Checks that every value in one column satisfies a comparison against a
/// fixed right-hand side.
pub struct SingleIntComparisonChecker<F: Fn(i64, i64) -> bool> {
    comp: F,
    col_idx: usize,
    rhs: i64,
    rows_seen: usize,
}

impl<F: Fn(i64, i64) -> bool> SingleIntComparisonChecker<F> {
    pub fn new(comp: F, col_idx: usize, rhs: i64) -> Self {
        Self { comp, col_idx, rhs, rows_seen: 0 }
    }
}

impl<F: Fn(i64, i64) -> bool> OutputChecker for SingleIntComparisonChecker<F> {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        for row in output {
            let value = int_at(row, self.col_idx)?;
            let ok = value.map(|v| (self.comp)(v, self.rhs)).unwrap_or(false);
            if !ok {
                return Err(CheckFailure::ComparisonFailed { row: self.rows_seen, value });
            }
            self.rows_seen += 1;
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        Ok(())
    }
}

/// Checks that two joined columns carry the same value in every row.
pub struct SingleIntJoinChecker {
    col1: usize,
    col2: usize,
    rows_seen: usize,
}

impl SingleIntJoinChecker {
    pub fn new(col1: usize, col2: usize) -> Self {
        Self { col1, col2, rows_seen: 0 }
    }
}

impl OutputChecker for SingleIntJoinChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        for row in output {
            let left = int_at(row, self.col1)?;
            let right = int_at(row, self.col2)?;
            if left != right {
                return Err(CheckFailure::JoinMismatch { row: self.rows_seen, left, right });
            }
            self.rows_seen += 1;
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        Ok(())
    }
}

/// Accumulates the non-null values of one column and compares the total at
/// finalize.
pub struct SingleIntSumChecker {
    col_idx: usize,
    expected: i64,
    sum: i64,
}

impl SingleIntSumChecker {
    pub fn new(col_idx: usize, expected: i64) -> Self {
        Self { col_idx, expected, sum: 0 }
    }
}

impl OutputChecker for SingleIntSumChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        for row in output {
            if let Some(v) = int_at(row, self.col_idx)? {
                self.sum += v;
            }
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        if self.sum == self.expected {
            Ok(())
        } else {
            Err(CheckFailure::WrongSum { expected: self.expected, actual: self.sum })
        }
    }
}

/// Checks that one column is nondecreasing across batches. A null compares
/// equal only to a preceding null.
pub struct SingleIntSortChecker {
    col_idx: usize,
    prev: Option<Option<i64>>,
    rows_seen: usize,
}

impl SingleIntSortChecker {
    pub fn new(col_idx: usize) -> Self {
        Self { col_idx, prev: None, rows_seen: 0 }
    }
}

impl OutputChecker for SingleIntSortChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        for row in output {
            let current = int_at(row, self.col_idx)?;
            if let Some(prev) = self.prev {
                let ordered = match (prev, current) {
                    // Nulls sort first and only follow nulls.
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(p), Some(c)) => c >= p,
                };
                if !ordered {
                    return Err(CheckFailure::OutOfOrder { row: self.rows_seen, prev, current });
                }
            }
            self.prev = Some(current);
            self.rows_seen += 1;
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        Ok(())
    }
}

pub type RowChecker = Box<dyn FnMut(&[SqlValue]) -> Result<(), CheckFailure>>;
pub type CorrectnessFn = Box<dyn Fn() -> Result<(), CheckFailure>>;

/// User-supplied per-row and finalize predicates.
pub struct GenericChecker {
    row_checker: Option<RowChecker>,
    correctness_fn: Option<CorrectnessFn>,
}

impl GenericChecker {
    pub fn new(row_checker: Option<RowChecker>, correctness_fn: Option<CorrectnessFn>) -> Self {
        Self { row_checker, correctness_fn }
    }
}

impl OutputChecker for GenericChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        if let Some(row_checker) = &mut self.row_checker {
            for row in output {
                row_checker(row)?;
            }
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        match &self.correctness_fn {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// Runs several checkers over the same output.
#[derive(Default)]
pub struct MultiChecker {
    checkers: Vec<Box<dyn OutputChecker>>,
}

impl MultiChecker {
    pub fn new(checkers: Vec<Box<dyn OutputChecker>>) -> Self {
        Self { checkers }
    }
}

impl OutputChecker for MultiChecker {
    fn process_batch(&mut self, output: &[Vec<SqlValue>]) -> Result<(), CheckFailure> {
        for checker in &mut self.checkers {
            checker.process_batch(output)?;
        }
        Ok(())
    }

    fn check_correctness(&self) -> Result<(), CheckFailure> {
        for checker in &self.checkers {
            checker.check_correctness()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_row(values: &[i64]) -> Vec<SqlValue> {
        values.iter().map(|&v| SqlValue::integer(v)).collect()
    }

    #[test]
    fn test_num_checker() {
        let mut checker = NumChecker::new(3);
        checker.process_batch(&[int_row(&[1]), int_row(&[2])]).unwrap();
        assert!(checker.check_correctness().is_err());
        checker.process_batch(&[int_row(&[3])]).unwrap();
        checker.check_correctness().unwrap();
    }

    #[test]
    fn test_comparison_checker() {
        let mut checker = SingleIntComparisonChecker::new(|a, b| a == b, 0, 500);
        checker.process_batch(&[int_row(&[500])]).unwrap();
        assert!(checker.process_batch(&[int_row(&[499])]).is_err());
    }

    #[test]
    fn test_join_checker() {
        let mut checker = SingleIntJoinChecker::new(0, 1);
        checker.process_batch(&[int_row(&[7, 7])]).unwrap();
        assert!(checker.process_batch(&[int_row(&[7, 8])]).is_err());
    }

    #[test]
    fn test_sum_checker_skips_nulls() {
        let mut checker = SingleIntSumChecker::new(0, 10);
        checker
            .process_batch(&[
                int_row(&[4]),
                vec![SqlValue::null_of(crate::sql::SqlTypeId::Integer)],
                int_row(&[6]),
            ])
            .unwrap();
        checker.check_correctness().unwrap();
    }

    #[test]
    fn test_sort_checker_uses_configured_column() {
        // The sort column is the second one; the first is deliberately
        // unsorted.
        let mut checker = SingleIntSortChecker::new(1);
        checker
            .process_batch(&[int_row(&[9, 1]), int_row(&[2, 2]), int_row(&[7, 2])])
            .unwrap();
        assert!(checker.process_batch(&[int_row(&[0, 1])]).is_err());
    }

    #[test]
    fn test_sort_checker_null_rules() {
        let null = SqlValue::null_of(crate::sql::SqlTypeId::Integer);
        let mut checker = SingleIntSortChecker::new(0);
        checker.process_batch(&[vec![null.clone()], vec![null.clone()]]).unwrap();
        checker.process_batch(&[int_row(&[1])]).unwrap();
        // A null after a value violates the order.
        assert!(checker.process_batch(&[vec![null]]).is_err());
    }

    #[test]
    fn test_multi_checker_fans_out() {
        let mut checker = MultiChecker::new(vec![
            Box::new(NumChecker::new(1)),
            Box::new(SingleIntComparisonChecker::new(|a, b| a < b, 0, 10)),
        ]);
        checker.process_batch(&[int_row(&[5])]).unwrap();
        checker.check_correctness().unwrap();
    }

    #[test]
    fn test_generic_checker() {
        let mut checker = GenericChecker::new(
            Some(Box::new(|row: &[SqlValue]| {
                if row.is_empty() {
                    Err(CheckFailure::Custom("empty row".to_string()))
                } else {
                    Ok(())
                }
            })),
            Some(Box::new(|| Ok(()))),
        );
        checker.process_batch(&[int_row(&[1])]).unwrap();
        assert!(checker.process_batch(&[vec![]]).is_err());
        checker.check_correctness().unwrap();
    }
}

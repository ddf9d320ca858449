// Output Store
//
// Bridges the runtime's raw (bytes, num_tuples, tuple_size) callback to a
// checker: decodes each tuple per the plan's output schema and forwards the
// decoded batch. The first failure is retained and surfaces at the final
// correctness check.

use std::cell::RefCell;
use std::rc::Rc;

use crate::checker::output_checker::{CheckFailure, OutputChecker};
use crate::exec::OutputCallback;
use crate::plan::OutputSchema;
use crate::sql::{SqlTypeId, SqlValue};

pub struct OutputStore {
    schema: OutputSchema,
    checker: Rc<RefCell<dyn OutputChecker>>,
    failure: Rc<RefCell<Option<CheckFailure>>>,
}

impl OutputStore {
    pub fn new(checker: Rc<RefCell<dyn OutputChecker>>, schema: &OutputSchema) -> Self {
        Self {
            schema: schema.clone(),
            checker,
            failure: Rc::new(RefCell::new(None)),
        }
    }

    fn decode_batch(schema: &OutputSchema, bytes: &[u8], num_tuples: u32, tuple_size: u32) -> Result<Vec<Vec<SqlValue>>, CheckFailure> {
        let mut rows = Vec::with_capacity(num_tuples as usize);
        for row in 0..num_tuples as usize {
            let tuple = &bytes[row * tuple_size as usize..];
            let mut offset = 0;
            let mut values = Vec::with_capacity(schema.len());
            for col in schema.columns() {
                match col.type_id {
                    SqlTypeId::TinyInt
                    | SqlTypeId::SmallInt
                    | SqlTypeId::Integer
                    | SqlTypeId::BigInt
                    | SqlTypeId::Boolean
                    | SqlTypeId::Decimal
                    | SqlTypeId::Date
                    | SqlTypeId::Varchar => {
                        let value = SqlValue::read_from(col.type_id, &tuple[offset..])
                            .map_err(|e| CheckFailure::Custom(format!("cannot decode output column: {}", e)))?;
                        values.push(value);
                    }
                }
                offset += col.type_id.encoded_size();
            }
            rows.push(values);
        }
        Ok(rows)
    }

    /// The output callback to hand to the execution context.
    pub fn callback(&self) -> OutputCallback {
        let schema = self.schema.clone();
        let checker = self.checker.clone();
        let failure = self.failure.clone();
        Box::new(move |bytes, num_tuples, tuple_size| {
            if failure.borrow().is_some() {
                return;
            }
            let result = Self::decode_batch(&schema, bytes, num_tuples, tuple_size)
                .and_then(|rows| checker.borrow_mut().process_batch(&rows));
            if let Err(e) = result {
                log::debug!("output check failed: {}", e);
                *failure.borrow_mut() = Some(e);
            }
        })
    }

    /// The retained batch failure, if any, then the checker's own verdict.
    pub fn check_correctness(&self) -> Result<(), CheckFailure> {
        if let Some(failure) = self.failure.borrow().clone() {
            return Err(failure);
        }
        self.checker.borrow().check_correctness()
    }
}

/// Fans one output batch out to several callbacks.
pub struct MultiOutputCallback {
    callbacks: Vec<OutputCallback>,
}

impl MultiOutputCallback {
    pub fn new(callbacks: Vec<OutputCallback>) -> Self {
        Self { callbacks }
    }

    pub fn into_callback(self) -> OutputCallback {
        let mut callbacks = self.callbacks;
        Box::new(move |bytes, num_tuples, tuple_size| {
            for callback in callbacks.iter_mut() {
                callback(bytes, num_tuples, tuple_size);
            }
        })
    }
}

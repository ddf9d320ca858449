// Output Buffer
//
// Collects finished tuples in a contiguous buffer laid out per the plan's
// output schema and flushes full batches to the output callback as
// (bytes, num_tuples, tuple_size).

use crate::exec::bytes::{ByteBuffer, BytePtr};
use crate::exec::context::OutputCallback;
use crate::plan::OutputSchema;

/// Rows per flushed batch.
const BATCH_CAPACITY: usize = 32;

pub struct OutputBuffer {
    tuple_size: usize,
    col_offsets: Vec<usize>,
    buf: ByteBuffer,
    num_tuples: u32,
    total_emitted: u64,
    callback: OutputCallback,
}

impl OutputBuffer {
    pub fn new(schema: &OutputSchema, callback: OutputCallback) -> Self {
        let tuple_size = schema.tuple_size();
        Self {
            tuple_size,
            col_offsets: schema.offsets(),
            buf: ByteBuffer::with_size(tuple_size * BATCH_CAPACITY),
            num_tuples: 0,
            total_emitted: 0,
            callback,
        }
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    fn current_offset(&self) -> usize {
        self.num_tuples as usize * self.tuple_size
    }

    /// Pointer to the slot for the tuple being written.
    pub fn alloc(&mut self) -> BytePtr {
        let offset = self.current_offset();
        self.buf.put(offset, &vec![0u8; self.tuple_size]);
        BytePtr { buf: self.buf.clone(), offset }
    }

    /// Mark column `col_idx` of the tuple being written as null.
    pub fn set_null(&mut self, col_idx: usize) {
        if let Some(&col_offset) = self.col_offsets.get(col_idx) {
            self.buf.put(self.current_offset() + col_offset, &[1]);
        }
    }

    /// Commit the tuple being written; flushes when the batch fills.
    pub fn advance(&mut self) {
        self.num_tuples += 1;
        self.total_emitted += 1;
        if self.num_tuples as usize == BATCH_CAPACITY {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.num_tuples == 0 {
            return;
        }
        let len = self.current_offset();
        let bytes = self.buf.get(0, len);
        (self.callback)(&bytes, self.num_tuples, self.tuple_size as u32);
        self.num_tuples = 0;
    }

    /// Flush the trailing partial batch.
    pub fn finalize(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OutputColumn;
    use crate::sql::{SqlTypeId, SqlValue};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn int_schema() -> OutputSchema {
        OutputSchema::new(vec![OutputColumn::new("col0", SqlTypeId::Integer)])
    }

    #[test]
    fn test_batches_and_finalize_emit_everything() {
        let total = Arc::new(AtomicU64::new(0));
        let batches = Arc::new(AtomicU64::new(0));
        let schema = int_schema();
        let mut out = {
            let total = total.clone();
            let batches = batches.clone();
            let tuple_size = schema.tuple_size() as u32;
            OutputBuffer::new(
                &schema,
                Box::new(move |bytes, n, size| {
                    assert_eq!(size, tuple_size);
                    assert_eq!(bytes.len(), n as usize * size as usize);
                    total.fetch_add(n as u64, Ordering::SeqCst);
                    batches.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };

        for i in 0..75i64 {
            let ptr = out.alloc();
            let mut enc = Vec::new();
            SqlValue::integer(i).write_to(SqlTypeId::Integer, &mut enc).unwrap();
            ptr.buf.put(ptr.offset, &enc);
            out.advance();
        }
        out.finalize();

        assert_eq!(total.load(Ordering::SeqCst), 75);
        // Two full batches of 32 plus the trailing 11.
        assert_eq!(batches.load(Ordering::SeqCst), 3);
        assert_eq!(out.total_emitted(), 75);
    }

    #[test]
    fn test_set_null_marks_current_tuple() {
        let schema = OutputSchema::new(vec![
            OutputColumn::new("a", SqlTypeId::Integer),
            OutputColumn::new("b", SqlTypeId::Integer),
        ]);
        let seen_null = Arc::new(AtomicU64::new(0));
        let mut out = {
            let seen_null = seen_null.clone();
            OutputBuffer::new(
                &schema,
                Box::new(move |bytes, n, size| {
                    for row in 0..n as usize {
                        let tuple = &bytes[row * size as usize..];
                        let b = SqlValue::read_from(SqlTypeId::Integer, &tuple[9..]).unwrap();
                        if b.is_null() {
                            seen_null.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }),
            )
        };

        out.alloc();
        out.set_null(1);
        out.advance();
        out.finalize();
        assert_eq!(seen_null.load(Ordering::SeqCst), 1);
    }
}

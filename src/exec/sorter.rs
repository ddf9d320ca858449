// Sorter
//
// Tuple materialization for sort pipelines: rows are inserted as fixed-size
// buffers, sorted once with a caller-supplied comparator, then drained
// through an iterator. Parallel variants merge thread-local runs.

use std::cmp::Ordering;

use crate::exec::bytes::ByteBuffer;
use crate::exec::context::{MemoryPool, ThreadStateContainer};

pub struct Sorter {
    tuple_size: usize,
    tuples: Vec<ByteBuffer>,
    sorted: bool,
}

impl Sorter {
    pub fn new(_mem_pool: &MemoryPool, tuple_size: usize) -> Self {
        Self {
            tuple_size,
            tuples: Vec::new(),
            sorted: false,
        }
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Reserve space for one input tuple; the caller fills the buffer.
    pub fn insert(&mut self) -> ByteBuffer {
        let buf = ByteBuffer::with_size(self.tuple_size);
        self.tuples.push(buf.clone());
        buf
    }

    fn ordering(cmp_result: i32) -> Ordering {
        cmp_result.cmp(&0)
    }

    /// Sort all inserted tuples with a three-way comparator.
    pub fn sort(&mut self, mut cmp: impl FnMut(&ByteBuffer, &ByteBuffer) -> i32) {
        self.tuples.sort_by(|a, b| Self::ordering(cmp(a, b)));
        self.sorted = true;
        log::trace!("sorter sorted {} tuples", self.tuples.len());
    }

    /// Merge thread-local runs into this sorter, then sort the whole input.
    pub fn sort_parallel(
        &mut self,
        runs: Vec<Sorter>,
        _tls: &ThreadStateContainer,
        cmp: impl FnMut(&ByteBuffer, &ByteBuffer) -> i32,
    ) {
        for run in runs {
            self.tuples.extend(run.tuples);
        }
        self.sort(cmp);
    }

    /// Parallel top-K: merge runs, sort, keep the first `k` tuples.
    pub fn sort_topk_parallel(
        &mut self,
        runs: Vec<Sorter>,
        tls: &ThreadStateContainer,
        cmp: impl FnMut(&ByteBuffer, &ByteBuffer) -> i32,
        k: u64,
    ) {
        self.sort_parallel(runs, tls, cmp);
        self.tuples.truncate(k as usize);
    }

    pub fn tuple(&self, idx: usize) -> Option<ByteBuffer> {
        self.tuples.get(idx).cloned()
    }
}

/// Cursor over a sorted run.
pub struct SorterIterator {
    tuples: Vec<ByteBuffer>,
    pos: usize,
}

impl SorterIterator {
    pub fn new(sorter: &Sorter) -> Self {
        Self { tuples: sorter.tuples.clone(), pos: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.tuples.len()
    }

    pub fn next(&mut self) {
        self.pos += 1;
    }

    pub fn get_row(&self) -> Option<ByteBuffer> {
        self.tuples.get(self.pos).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn put_i64(buf: &ByteBuffer, v: i64) {
        let mut bytes = [0u8; 8];
        LittleEndian::write_i64(&mut bytes, v);
        buf.put(0, &bytes);
    }

    fn get_i64(buf: &ByteBuffer) -> i64 {
        buf.read(|b| LittleEndian::read_i64(&b[..8]))
    }

    fn int_cmp(a: &ByteBuffer, b: &ByteBuffer) -> i32 {
        (get_i64(a) - get_i64(b)).signum() as i32
    }

    #[test]
    fn test_sort_and_drain() {
        let mem = MemoryPool::new();
        let mut sorter = Sorter::new(&mem, 8);
        for v in [5i64, 1, 4, 2, 3] {
            put_i64(&sorter.insert(), v);
        }
        sorter.sort(int_cmp);

        let mut iter = SorterIterator::new(&sorter);
        let mut seen = Vec::new();
        while iter.has_next() {
            seen.push(get_i64(&iter.get_row().unwrap()));
            iter.next();
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_parallel_merge_of_runs() {
        let mem = MemoryPool::new();
        let tls = ThreadStateContainer::new();
        let mut global = Sorter::new(&mem, 8);
        let mut runs = Vec::new();
        for t in 0..4i64 {
            let mut run = Sorter::new(&mem, 8);
            for v in 0..10 {
                put_i64(&run.insert(), (3 - t) * 10 + v);
            }
            runs.push(run);
        }
        global.sort_parallel(runs, &tls, int_cmp);
        assert_eq!(global.len(), 40);
        assert_eq!(get_i64(&global.tuple(0).unwrap()), 0);
        assert_eq!(get_i64(&global.tuple(39).unwrap()), 39);
    }

    #[test]
    fn test_topk_truncates() {
        let mem = MemoryPool::new();
        let tls = ThreadStateContainer::new();
        let mut sorter = Sorter::new(&mem, 8);
        for v in [9i64, 3, 7, 1, 5] {
            put_i64(&sorter.insert(), v);
        }
        sorter.sort_topk_parallel(Vec::new(), &tls, int_cmp, 2);
        assert_eq!(sorter.len(), 2);
        assert_eq!(get_i64(&sorter.tuple(0).unwrap()), 1);
        assert_eq!(get_i64(&sorter.tuple(1).unwrap()), 3);
    }
}

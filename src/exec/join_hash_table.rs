// Join Hash Table
//
// Build-side materialization for hash joins: tuples are inserted with their
// key hash, the chain index is built once at pipeline finalize, and probes
// walk the matching chain with a caller-supplied key-equality test.

use std::collections::HashMap;

use crate::exec::bytes::ByteBuffer;
use crate::exec::context::{MemoryPool, ThreadStateContainer};

pub struct JoinHashTable {
    tuple_size: usize,
    entries: Vec<(u64, ByteBuffer)>,
    chains: HashMap<u64, Vec<usize>>,
    built: bool,
}

impl JoinHashTable {
    pub fn new(_mem_pool: &MemoryPool, tuple_size: usize) -> Self {
        Self {
            tuple_size,
            entries: Vec::new(),
            chains: HashMap::new(),
            built: false,
        }
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Reserve space for one build tuple under `hash`; the caller writes the
    /// tuple through the returned buffer.
    pub fn insert(&mut self, hash: u64) -> ByteBuffer {
        let buf = ByteBuffer::with_size(self.tuple_size);
        self.entries.push((hash, buf.clone()));
        buf
    }

    /// Build the chain index over everything inserted so far.
    pub fn build(&mut self) {
        if self.built {
            return;
        }
        for (idx, (hash, _)) in self.entries.iter().enumerate() {
            self.chains.entry(*hash).or_default().push(idx);
        }
        self.built = true;
        log::trace!("join hash table built over {} tuples", self.entries.len());
    }

    /// Merge thread-local tables, then build. The serial fallback with no
    /// sources is a plain build.
    pub fn build_parallel(&mut self, sources: Vec<JoinHashTable>, _tls: &ThreadStateContainer) {
        for source in sources {
            self.entries.extend(source.entries);
        }
        self.build();
    }

    /// Candidate chain for `hash`; empty until built.
    pub fn candidates(&self, hash: u64) -> Vec<ByteBuffer> {
        match self.chains.get(&hash) {
            Some(chain) => chain.iter().map(|&i| self.entries[i].1.clone()).collect(),
            None => Vec::new(),
        }
    }
}

/// Probe-side cursor over one hash chain.
pub struct JoinHashTableIterator {
    candidates: Vec<ByteBuffer>,
    pos: usize,
    current: Option<ByteBuffer>,
}

impl JoinHashTableIterator {
    pub fn new(table: &JoinHashTable, hash: u64) -> Self {
        Self {
            candidates: table.candidates(hash),
            pos: 0,
            current: None,
        }
    }

    /// Advance to the next candidate satisfying `key_eq`. The matched row is
    /// then available through `get_row`.
    pub fn has_next(&mut self, mut key_eq: impl FnMut(&ByteBuffer) -> bool) -> bool {
        while self.pos < self.candidates.len() {
            let candidate = self.candidates[self.pos].clone();
            self.pos += 1;
            if key_eq(&candidate) {
                self.current = Some(candidate);
                return true;
            }
        }
        self.current = None;
        false
    }

    pub fn get_row(&self) -> Option<ByteBuffer> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn write_key(buf: &ByteBuffer, key: i64) {
        let mut bytes = [0u8; 8];
        LittleEndian::write_i64(&mut bytes, key);
        buf.put(0, &bytes);
    }

    fn read_key(buf: &ByteBuffer) -> i64 {
        buf.read(|b| LittleEndian::read_i64(&b[..8]))
    }

    #[test]
    fn test_insert_build_probe() {
        let mem = MemoryPool::new();
        let mut jht = JoinHashTable::new(&mem, 8);
        for key in 0..10i64 {
            let buf = jht.insert(key as u64 % 3);
            write_key(&buf, key);
        }
        jht.build();

        // All keys hashing to bucket 1: 1, 4, 7.
        let mut iter = JoinHashTableIterator::new(&jht, 1);
        let mut found = Vec::new();
        while iter.has_next(|_| true) {
            found.push(read_key(&iter.get_row().unwrap()));
        }
        assert_eq!(found, vec![1, 4, 7]);
    }

    #[test]
    fn test_key_equality_filters_collisions() {
        let mem = MemoryPool::new();
        let mut jht = JoinHashTable::new(&mem, 8);
        // Two different keys, same hash bucket.
        write_key(&jht.insert(42), 7);
        write_key(&jht.insert(42), 8);
        jht.build();

        let mut iter = JoinHashTableIterator::new(&jht, 42);
        let mut matched = 0;
        while iter.has_next(|row| read_key(row) == 8) {
            matched += 1;
            assert_eq!(read_key(&iter.get_row().unwrap()), 8);
        }
        assert_eq!(matched, 1);
    }

    #[test]
    fn test_parallel_build_merges_sources() {
        let mem = MemoryPool::new();
        let tls = ThreadStateContainer::new();
        let mut global = JoinHashTable::new(&mem, 8);
        let mut sources = Vec::new();
        for t in 0..4 {
            let mut local = JoinHashTable::new(&mem, 8);
            for k in 0..25i64 {
                write_key(&local.insert(1), t * 25 + k);
            }
            sources.push(local);
        }
        global.build_parallel(sources, &tls);
        assert_eq!(global.len(), 100);
        assert_eq!(global.candidates(1).len(), 100);
    }
}

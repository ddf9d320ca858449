// Aggregation Hash Table
//
// Group storage for hash aggregation: payloads are allocated per group key
// hash and found again through a caller-supplied key-equality test. Groups
// iterate in insertion order, and partition moves merge thread-local tables
// for the parallel build path.

use linked_hash_map::LinkedHashMap;

use crate::exec::bytes::ByteBuffer;
use crate::exec::context::{MemoryPool, ThreadStateContainer};

/// Number of radix partitions used by the overflow partition iterator.
const NUM_PARTITIONS: usize = 64;

pub struct AggregationHashTable {
    payload_size: usize,
    groups: LinkedHashMap<u64, Vec<ByteBuffer>>,
}

impl AggregationHashTable {
    pub fn new(_mem_pool: &MemoryPool, payload_size: usize) -> Self {
        Self {
            payload_size,
            groups: LinkedHashMap::new(),
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn num_groups(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    /// Allocate a payload for a new group under `hash`.
    pub fn insert(&mut self, hash: u64) -> ByteBuffer {
        let buf = ByteBuffer::with_size(self.payload_size);
        self.groups.entry(hash).or_insert_with(Vec::new).push(buf.clone());
        buf
    }

    /// Find the payload under `hash` whose keys satisfy `key_eq`.
    pub fn lookup(&self, hash: u64, mut key_eq: impl FnMut(&ByteBuffer) -> bool) -> Option<ByteBuffer> {
        self.groups.get(&hash)?.iter().find(|buf| key_eq(buf)).cloned()
    }

    /// Every payload chained under `hash`.
    pub fn candidates(&self, hash: u64) -> Vec<ByteBuffer> {
        self.groups.get(&hash).map(|v| v.to_vec()).unwrap_or_default()
    }

    /// Payloads in insertion order.
    pub fn payloads(&self) -> Vec<ByteBuffer> {
        self.groups.values().flatten().cloned().collect()
    }

    /// Fold one projected vector into the table: hash each row, find or
    /// allocate its group, and advance the group's aggregators.
    pub fn process_batch(
        &mut self,
        pci: &mut crate::exec::projected_columns::ProjectedColumnsIterator,
        hash_fn: impl Fn(&crate::exec::projected_columns::ProjectedColumnsIterator) -> u64,
        mut key_eq: impl FnMut(&ByteBuffer, &crate::exec::projected_columns::ProjectedColumnsIterator) -> bool,
        mut init_fn: impl FnMut(&ByteBuffer, &crate::exec::projected_columns::ProjectedColumnsIterator),
        mut advance_fn: impl FnMut(&ByteBuffer, &crate::exec::projected_columns::ProjectedColumnsIterator),
    ) {
        while pci.has_next_filtered() {
            let hash = hash_fn(pci);
            let payload = match self.lookup(hash, |buf| key_eq(buf, pci)) {
                Some(payload) => payload,
                None => {
                    let payload = self.insert(hash);
                    init_fn(&payload, pci);
                    payload
                }
            };
            advance_fn(&payload, pci);
            pci.advance_filtered();
        }
    }

    /// Merge thread-local tables into this one, chaining same-hash groups.
    /// The caller's merge logic runs per moved payload.
    pub fn move_partitions(
        &mut self,
        sources: Vec<AggregationHashTable>,
        _tls: &ThreadStateContainer,
        mut merge: impl FnMut(&mut AggregationHashTable, u64, ByteBuffer),
    ) {
        for source in sources {
            for (hash, payloads) in source.groups {
                for payload in payloads {
                    merge(self, hash, payload);
                }
            }
        }
    }

    /// (hash, payload) pairs of one radix partition.
    pub fn partition(&self, partition_idx: usize) -> Vec<(u64, ByteBuffer)> {
        self.groups
            .iter()
            .filter(|(hash, _)| (**hash as usize) % NUM_PARTITIONS == partition_idx)
            .flat_map(|(hash, payloads)| payloads.iter().map(move |p| (*hash, p.clone())))
            .collect()
    }
}

/// Cursor over every group payload, in insertion order.
pub struct AggregationHashTableIterator {
    payloads: Vec<ByteBuffer>,
    pos: usize,
}

impl AggregationHashTableIterator {
    pub fn new(table: &AggregationHashTable) -> Self {
        Self { payloads: table.payloads(), pos: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.payloads.len()
    }

    pub fn next(&mut self) {
        self.pos += 1;
    }

    pub fn get_row(&self) -> Option<ByteBuffer> {
        self.payloads.get(self.pos).cloned()
    }
}

/// Cursor over one overflow partition's (hash, payload) pairs.
pub struct AggOverflowPartitionIterator {
    rows: Vec<(u64, ByteBuffer)>,
    pos: usize,
}

impl AggOverflowPartitionIterator {
    pub fn new(table: &AggregationHashTable, partition_idx: usize) -> Self {
        Self { rows: table.partition(partition_idx % NUM_PARTITIONS), pos: 0 }
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.rows.len()
    }

    pub fn next(&mut self) {
        self.pos += 1;
    }

    pub fn get_hash(&self) -> Option<u64> {
        self.rows.get(self.pos).map(|(h, _)| *h)
    }

    pub fn get_row(&self) -> Option<ByteBuffer> {
        self.rows.get(self.pos).map(|(_, b)| b.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_by_key() {
        let mem = MemoryPool::new();
        let mut aht = AggregationHashTable::new(&mem, 4);
        let a = aht.insert(10);
        a.put(0, &[1]);
        let b = aht.insert(10);
        b.put(0, &[2]);

        let hit = aht.lookup(10, |buf| buf.get(0, 1)[0] == 2).unwrap();
        assert_eq!(hit.get(0, 1), vec![2]);
        assert!(aht.lookup(10, |buf| buf.get(0, 1)[0] == 3).is_none());
        assert!(aht.lookup(11, |_| true).is_none());
        assert_eq!(aht.num_groups(), 2);
    }

    #[test]
    fn test_iterator_preserves_insertion_order() {
        let mem = MemoryPool::new();
        let mut aht = AggregationHashTable::new(&mem, 1);
        for i in 0..5u8 {
            aht.insert(i as u64 * 100).put(0, &[i]);
        }
        let mut iter = AggregationHashTableIterator::new(&aht);
        let mut seen = Vec::new();
        while iter.has_next() {
            seen.push(iter.get_row().unwrap().get(0, 1)[0]);
            iter.next();
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_move_partitions_merges_sources() {
        let mem = MemoryPool::new();
        let tls = ThreadStateContainer::new();
        let mut global = AggregationHashTable::new(&mem, 1);
        let mut locals = Vec::new();
        for t in 0..3u8 {
            let mut local = AggregationHashTable::new(&mem, 1);
            local.insert(7).put(0, &[t]);
            locals.push(local);
        }
        global.move_partitions(locals, &tls, |table, hash, payload| {
            let buf = table.insert(hash);
            buf.put(0, &payload.get(0, 1));
        });
        assert_eq!(global.num_groups(), 3);
    }

    #[test]
    fn test_process_batch_groups_and_advances() {
        use crate::exec::projected_columns::{ProjectedColumns, ProjectedColumnsIterator};
        use crate::sql::{SqlTypeId, SqlValue};

        let mem = MemoryPool::new();
        let mut aht = AggregationHashTable::new(&mem, 9);
        let mut pc = ProjectedColumns::new(vec![SqlTypeId::Integer]);
        for i in 0..30i64 {
            pc.push_row(vec![SqlValue::integer(i % 3)]);
        }
        let mut pci = ProjectedColumnsIterator::new(pc);

        aht.process_batch(
            &mut pci,
            |pci| pci.get(0).as_integer().unwrap() as u64,
            |payload, pci| payload.get(0, 1)[0] as i64 == pci.get(0).as_integer().unwrap(),
            |payload, pci| payload.put(0, &[pci.get(0).as_integer().unwrap() as u8]),
            |payload, _| {
                let count = payload.get(1, 1)[0];
                payload.put(1, &[count + 1]);
            },
        );

        assert_eq!(aht.num_groups(), 3);
        for payload in aht.payloads() {
            assert_eq!(payload.get(1, 1)[0], 10);
        }
    }

    #[test]
    fn test_overflow_partition_iterator() {
        let mem = MemoryPool::new();
        let mut aht = AggregationHashTable::new(&mem, 1);
        aht.insert(0);
        aht.insert(64);
        aht.insert(1);

        let mut part0 = AggOverflowPartitionIterator::new(&aht, 0);
        let mut count = 0;
        while part0.has_next() {
            assert_eq!(part0.get_hash().unwrap() % 64, 0);
            count += 1;
            part0.next();
        }
        assert_eq!(count, 2);
    }
}

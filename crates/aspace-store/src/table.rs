//! Open-addressing node table with double hashing over prime capacities.
//!
//! Every entry lives directly in the slot array. A lookup for a NodeId with
//! hash `h` in a table of capacity `size` starts at `h mod size` and advances
//! by `1 + h mod (size - 2)`. Capacities are primes, so the stride is coprime
//! with the capacity and a probe sequence visits every slot exactly once.
//!
//! Removed entries leave a tombstone rather than an empty slot: lookups skip
//! over tombstones so that probe chains passing through a deleted slot stay
//! intact, while insertion reuses the first tombstone it meets.

use std::sync::Arc;

use aspace_types::NodeId;
use tracing::debug;

use crate::config::NodestoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::node::Node;

/// Ascending primes close to successive powers of two.
const PRIMES: [u32; 30] = [
    7, 13, 31, 61, 127, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749, 65521, 131071, 262139,
    524287, 1048573, 2097143, 4194301, 8388593, 16777213, 33554393, 67108859, 134217689,
    268435399, 536870909, 1073741789, 2147483647, 4294967291,
];

/// Index of the smallest prime `>= n`, clamped to the largest prime.
fn higher_prime_index(n: usize) -> usize {
    PRIMES
        .partition_point(|&p| (p as usize) < n)
        .min(PRIMES.len() - 1)
}

/// The slot indices visited when looking for `hash` in a table of `size`.
fn probe(hash: u32, size: usize) -> impl Iterator<Item = usize> {
    let h = hash as usize;
    let start = h % size;
    let stride = 1 + h % (size - 2);
    (0..size).scan(start, move |idx, _| {
        let current = *idx;
        *idx = (current + stride) % size;
        Some(current)
    })
}

/// A live table entry: the resident node and the generation it was
/// installed under.
#[derive(Clone, Debug)]
pub struct Entry {
    pub node: Arc<Node>,
    pub generation: u64,
}

#[derive(Clone, Debug)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(Entry),
}

/// Outcome of searching for a slot to insert into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSearch {
    /// The first empty or tombstoned slot on the probe chain.
    Vacant(usize),
    /// A live entry with the same NodeId exists.
    Duplicate,
    /// Every slot holds a live entry.
    Full,
}

/// Occupancy counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub capacity: usize,
    pub live: usize,
    pub tombstones: usize,
}

/// The slot array and its occupancy bookkeeping.
///
/// The table itself is not synchronized; backends wrap it in whatever lock
/// their sharing model requires.
pub struct NodeTable {
    slots: Vec<Slot>,
    count: usize,
    tombstones: usize,
    config: NodestoreConfig,
}

/// A slot array of `size` empty slots, or `OutOfMemory`.
fn allocate(size: usize) -> StoreResult<Vec<Slot>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(size)?;
    slots.resize(size, Slot::Empty);
    Ok(slots)
}

impl NodeTable {
    /// Create an empty table sized to the configured floor.
    ///
    /// Allocates infallibly; use [`try_new`](Self::try_new) for a floor
    /// that did not come from [`NodestoreConfig::default`].
    pub fn new(config: NodestoreConfig) -> Self {
        let size = PRIMES[higher_prime_index(config.min_capacity)] as usize;
        Self {
            slots: vec![Slot::Empty; size],
            count: 0,
            tombstones: 0,
            config,
        }
    }

    /// Create an empty table sized to the configured floor, reporting a
    /// failed allocation as [`StoreError::OutOfMemory`].
    pub fn try_new(config: NodestoreConfig) -> StoreResult<Self> {
        let size = PRIMES[higher_prime_index(config.min_capacity)] as usize;
        Ok(Self {
            slots: allocate(size)?,
            count: 0,
            tombstones: 0,
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            capacity: self.slots.len(),
            live: self.count,
            tombstones: self.tombstones,
        }
    }

    /// Slot index of the live entry for `id`.
    pub fn find(&self, id: &NodeId) -> Option<usize> {
        for idx in probe(id.hash32(), self.slots.len()) {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Tombstone => continue,
                Slot::Occupied(entry) if entry.node.node_id == *id => return Some(idx),
                Slot::Occupied(_) => continue,
            }
        }
        None
    }

    /// Find where `id` would be inserted.
    ///
    /// Remembers the first tombstone it passes but keeps probing until an
    /// empty slot, so a live duplicate further down the chain is still
    /// detected.
    pub fn find_free_slot(&self, id: &NodeId) -> SlotSearch {
        let mut candidate = None;
        for idx in probe(id.hash32(), self.slots.len()) {
            match &self.slots[idx] {
                Slot::Occupied(entry) if entry.node.node_id == *id => {
                    return SlotSearch::Duplicate
                }
                Slot::Occupied(_) => {}
                Slot::Tombstone => {
                    candidate.get_or_insert(idx);
                }
                Slot::Empty => return SlotSearch::Vacant(candidate.unwrap_or(idx)),
            }
        }
        candidate.map_or(SlotSearch::Full, SlotSearch::Vacant)
    }

    pub fn entry(&self, idx: usize) -> Option<&Entry> {
        match self.slots.get(idx) {
            Some(Slot::Occupied(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Place `entry` in a slot returned by [`find_free_slot`](Self::find_free_slot).
    pub fn insert_at(&mut self, idx: usize, entry: Entry) -> StoreResult<()> {
        match &self.slots[idx] {
            Slot::Occupied(_) => {
                return Err(StoreError::Internal(format!("slot {idx} is already live")))
            }
            Slot::Tombstone => self.tombstones -= 1,
            Slot::Empty => {}
        }
        self.slots[idx] = Slot::Occupied(entry);
        self.count += 1;
        Ok(())
    }

    /// Swap the occupant of a live slot, returning the previous entry.
    pub fn replace_at(&mut self, idx: usize, entry: Entry) -> StoreResult<Entry> {
        match &mut self.slots[idx] {
            Slot::Occupied(current) => Ok(std::mem::replace(current, entry)),
            _ => Err(StoreError::Internal(format!("slot {idx} is not live"))),
        }
    }

    /// Tombstone a live slot, returning its entry.
    pub fn remove_at(&mut self, idx: usize) -> StoreResult<Entry> {
        match std::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied(entry) => {
                self.count -= 1;
                self.tombstones += 1;
                Ok(entry)
            }
            other => {
                self.slots[idx] = other;
                Err(StoreError::Internal(format!("slot {idx} is not live")))
            }
        }
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        })
    }

    /// Make room for one more entry.
    ///
    /// Rehashes when live plus tombstoned slots would pass the grow load
    /// factor. The rehash target is sized from the live count alone, so a
    /// table clogged with tombstones is compacted rather than grown.
    pub fn expand_if_needed(&mut self) -> StoreResult<()> {
        let occupied = self.count + self.tombstones + 1;
        if occupied * self.config.grow_denominator > self.slots.len() * self.config.grow_numerator
        {
            self.resize()?;
        }
        Ok(())
    }

    /// Give back capacity once the live load falls under the shrink bound.
    pub fn shrink_if_needed(&mut self) -> StoreResult<()> {
        let floor = PRIMES[higher_prime_index(self.config.min_capacity)] as usize;
        if self.slots.len() > floor
            && self.count * self.config.shrink_denominator
                < self.slots.len() * self.config.shrink_numerator
        {
            self.resize()?;
        }
        Ok(())
    }

    /// Rehash every live entry into a fresh array of
    /// `primes[>= max(2 * live, min_capacity)]` slots.
    fn resize(&mut self) -> StoreResult<()> {
        let target = (self.count * 2).max(self.config.min_capacity);
        let size = PRIMES[higher_prime_index(target)] as usize;

        let slots = allocate(size)?;
        let old = std::mem::replace(&mut self.slots, slots);
        let old_size = old.len();
        for slot in old {
            if let Slot::Occupied(entry) = slot {
                // Ids in the old table are unique and the new array has room,
                // so the first empty slot on the chain is the right one.
                let idx = probe(entry.node.node_id.hash32(), size)
                    .find(|&i| matches!(self.slots[i], Slot::Empty))
                    .ok_or_else(|| StoreError::Internal("rehash target is full".into()))?;
                self.slots[idx] = Slot::Occupied(entry);
            }
        }
        debug!(
            from = old_size,
            to = size,
            live = self.count,
            dropped_tombstones = self.tombstones,
            "node table resized"
        );
        self.tombstones = 0;
        Ok(())
    }
}

impl std::fmt::Debug for NodeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTable")
            .field("capacity", &self.slots.len())
            .field("live", &self.count)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspace_types::NodeClass;

    fn entry(id: NodeId, generation: u64) -> Entry {
        let mut node = Node::new(NodeClass::Object);
        node.node_id = id;
        Entry {
            node: Arc::new(node),
            generation,
        }
    }

    fn insert(table: &mut NodeTable, id: NodeId) {
        table.expand_if_needed().unwrap();
        match table.find_free_slot(&id) {
            SlotSearch::Vacant(idx) => table.insert_at(idx, entry(id, 0)).unwrap(),
            other => panic!("no slot for {id}: {other:?}"),
        }
    }

    fn remove(table: &mut NodeTable, id: &NodeId) {
        let idx = table.find(id).expect("present");
        table.remove_at(idx).unwrap();
        table.shrink_if_needed().unwrap();
    }

    fn load_bounds_hold(table: &NodeTable) -> bool {
        let s = table.stats();
        (s.live + s.tombstones) * 4 <= s.capacity * 3
    }

    // -----------------------------------------------------------------------
    // Prime sizing and probing
    // -----------------------------------------------------------------------

    #[test]
    fn prime_index_lookup() {
        assert_eq!(PRIMES[higher_prime_index(0)], 7);
        assert_eq!(PRIMES[higher_prime_index(7)], 7);
        assert_eq!(PRIMES[higher_prime_index(8)], 13);
        assert_eq!(PRIMES[higher_prime_index(64)], 127);
        assert_eq!(PRIMES[higher_prime_index(usize::MAX)], 4294967291);
    }

    #[test]
    fn probe_visits_every_slot_once() {
        for size in [7usize, 13, 127] {
            for hash in [0u32, 1, 5, 12345, u32::MAX] {
                let mut seen: Vec<usize> = probe(hash, size).collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..size).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn initial_capacity_is_prime_at_or_above_floor() {
        let table = NodeTable::new(NodestoreConfig::default());
        assert_eq!(table.capacity(), 127);
        assert!(table.is_empty());
    }

    #[test]
    fn try_new_sizes_like_new() {
        let config = NodestoreConfig {
            min_capacity: 1000,
            ..Default::default()
        };
        let table = NodeTable::try_new(config).unwrap();
        assert_eq!(table.capacity(), 1021);
        assert_eq!(table.stats().tombstones, 0);
    }

    // -----------------------------------------------------------------------
    // Find / insert / remove
    // -----------------------------------------------------------------------

    #[test]
    fn find_after_insert() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        let id = NodeId::numeric(1, 42);
        insert(&mut table, id.clone());
        let idx = table.find(&id).unwrap();
        assert_eq!(table.entry(idx).unwrap().node.node_id, id);
        assert!(table.find(&NodeId::numeric(1, 43)).is_none());
    }

    #[test]
    fn duplicate_is_detected_past_tombstones() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        let ids: Vec<NodeId> = (0..40).map(|i| NodeId::numeric(1, i)).collect();
        for id in &ids {
            insert(&mut table, id.clone());
        }
        for id in ids.iter().step_by(2) {
            let idx = table.find(id).unwrap();
            table.remove_at(idx).unwrap();
        }
        for id in ids.iter().skip(1).step_by(2) {
            assert_eq!(table.find_free_slot(id), SlotSearch::Duplicate);
            assert!(table.find(id).is_some());
        }
        for id in ids.iter().step_by(2) {
            assert!(matches!(table.find_free_slot(id), SlotSearch::Vacant(_)));
        }
    }

    #[test]
    fn tombstone_is_reused() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        let id = NodeId::string(2, "reuse");
        insert(&mut table, id.clone());
        let idx = table.find(&id).unwrap();
        table.remove_at(idx).unwrap();
        assert_eq!(table.stats().tombstones, 1);
        assert_eq!(table.find_free_slot(&id), SlotSearch::Vacant(idx));
        table.insert_at(idx, entry(id.clone(), 1)).unwrap();
        assert_eq!(table.stats().tombstones, 0);
        assert!(table.insert_at(idx, entry(id, 2)).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_at_rejects_dead_slots() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        assert!(table.remove_at(0).is_err());
        assert!(table.replace_at(0, entry(NodeId::numeric(1, 1), 0)).is_err());
        assert_eq!(table.stats().tombstones, 0);
    }

    // -----------------------------------------------------------------------
    // Resizing
    // -----------------------------------------------------------------------

    #[test]
    fn grows_past_three_quarters() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        for i in 0..1000 {
            insert(&mut table, NodeId::numeric(1, i));
            assert!(load_bounds_hold(&table));
        }
        assert_eq!(table.len(), 1000);
        assert!(table.capacity() >= 1334);
        for i in 0..1000 {
            assert!(table.find(&NodeId::numeric(1, i)).is_some());
        }
    }

    #[test]
    fn shrinks_back_to_floor() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        for i in 0..1000 {
            insert(&mut table, NodeId::numeric(1, i));
        }
        for i in 0..1000 {
            remove(&mut table, &NodeId::numeric(1, i));
        }
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 127);
    }

    #[test]
    fn churn_compacts_tombstones() {
        let mut table = NodeTable::new(NodestoreConfig::default());
        for round in 0..50u32 {
            for i in 0..20 {
                insert(&mut table, NodeId::numeric(1, round * 100 + i));
            }
            for i in 0..20 {
                let id = NodeId::numeric(1, round * 100 + i);
                let idx = table.find(&id).unwrap();
                table.remove_at(idx).unwrap();
            }
            assert!(load_bounds_hold(&table));
        }
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 127);
    }

    mod props {
        use super::*;
        use proptest::collection::hash_set;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn insert_then_remove_keeps_table_healthy(
                keys in hash_set(any::<u32>(), 0..400),
            ) {
                let mut table = NodeTable::new(NodestoreConfig::default());
                let ids: Vec<NodeId> = keys.iter().map(|&k| NodeId::numeric(3, k)).collect();
                for id in &ids {
                    insert(&mut table, id.clone());
                    prop_assert!(load_bounds_hold(&table));
                }
                prop_assert_eq!(table.len(), ids.len());
                for id in &ids {
                    prop_assert!(table.find(id).is_some());
                }
                for id in &ids {
                    remove(&mut table, id);
                    prop_assert!(table.find(id).is_none());
                }
                prop_assert!(table.is_empty());
                prop_assert_eq!(table.iter().count(), 0);

                let again = NodeId::string(3, "after");
                insert(&mut table, again.clone());
                prop_assert!(table.find(&again).is_some());
            }
        }
    }
}

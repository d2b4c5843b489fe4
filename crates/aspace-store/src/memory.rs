//! The default in-memory node store.
//!
//! [`HashMapNodestore`] keeps every node in a [`NodeTable`] behind a
//! reader-writer lock. Nodes are held as `Arc<Node>`, so a reader takes the
//! lock only long enough to find the slot and then holds its [`NodeRef`]
//! without blocking writers. Writers never mutate a resident node: updates
//! install a new node and the previous occupant is freed once the last
//! reader releases it.
//!
//! Each installed occupant is stamped with a store-unique generation. A copy
//! handed out by `get_node_copy` remembers the generation it was taken from,
//! and `replace_node` installs it only if that generation is still resident.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aspace_types::NodeId;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::NodestoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::node::{Node, Provenance};
use crate::table::{Entry, NodeTable, SlotSearch, TableStats};
use crate::traits::{NodeRef, Nodestore};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    table: NodeTable,
    next_generation: u64,
    auto_id_namespace: u16,
}

impl Inner {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Pick an unused numeric id in the auto-id namespace.
    ///
    /// Candidates start just past the live count and step by a stride derived
    /// from that start, wrapping modulo the capacity. The capacity is prime
    /// and exceeds the live count, so the walk reaches a free id.
    fn assign_numeric_id(&self) -> StoreResult<(NodeId, usize)> {
        let size = self.table.capacity() as u64;
        let mut identifier = (self.table.len() as u64 + 1) % size;
        let stride = 1 + identifier % (size - 2);
        for _ in 0..size {
            let candidate = NodeId::numeric(self.auto_id_namespace, identifier as u32);
            if let SlotSearch::Vacant(idx) = self.table.find_free_slot(&candidate) {
                return Ok((candidate, idx));
            }
            identifier = (identifier + stride) % size;
        }
        Err(StoreError::Internal(
            "no free numeric id in the node table".into(),
        ))
    }
}

/// In-memory, hash-table-backed node store with full read/write support.
pub struct HashMapNodestore {
    store_id: u64,
    inner: RwLock<Inner>,
}

impl HashMapNodestore {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        let config = NodestoreConfig::default();
        let auto_id_namespace = config.auto_id_namespace;
        Self::build(NodeTable::new(config), auto_id_namespace)
    }

    /// Create an empty store after validating `config`.
    pub fn with_config(config: NodestoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let auto_id_namespace = config.auto_id_namespace;
        Ok(Self::build(NodeTable::try_new(config)?, auto_id_namespace))
    }

    fn build(table: NodeTable, auto_id_namespace: u16) -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(Inner {
                table,
                next_generation: 0,
                auto_id_namespace,
            }),
        }
    }

    /// Identity of this store instance, recorded in copy provenance.
    pub fn store_id(&self) -> u64 {
        self.store_id
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().table.is_empty()
    }

    /// Current slot array capacity.
    pub fn capacity(&self) -> usize {
        self.inner.read().table.capacity()
    }

    pub fn stats(&self) -> TableStats {
        self.inner.read().table.stats()
    }
}

impl Default for HashMapNodestore {
    fn default() -> Self {
        Self::new()
    }
}

impl Nodestore for HashMapNodestore {
    fn get_node(&self, id: &NodeId) -> Option<NodeRef> {
        let inner = self.inner.read();
        let entry = inner.table.entry(inner.table.find(id)?)?;
        Some(NodeRef::stored(Arc::clone(&entry.node), entry.generation))
    }

    fn get_node_copy(&self, id: &NodeId) -> Option<Node> {
        let inner = self.inner.read();
        let entry = inner.table.entry(inner.table.find(id)?)?;
        let mut copy = Node::clone(&entry.node);
        copy.set_provenance(Some(Provenance {
            store: self.store_id,
            generation: entry.generation,
        }));
        Some(copy)
    }

    fn edit_node(&self, id: &NodeId, edit: &mut dyn FnMut(&mut Node)) -> StoreResult<()> {
        // The closure runs on a private clone with no lock held, so it may
        // call back into the store. The clone goes in through the replace
        // path and loses to any write that landed while it ran.
        let (mut edited, copied_from) = {
            let inner = self.inner.read();
            let entry = inner
                .table
                .find(id)
                .and_then(|idx| inner.table.entry(idx))
                .ok_or_else(|| StoreError::NodeIdUnknown(id.clone()))?;
            (Node::clone(&entry.node), entry.generation)
        };
        let class = edited.class();

        edit(&mut edited);
        if edited.class() != class {
            return Err(StoreError::ClassMismatch {
                id: id.clone(),
                expected: class,
                found: edited.class(),
            });
        }
        if edited.node_id != *id {
            return Err(StoreError::Internal(format!(
                "edit of {id} changed its node id to {}",
                edited.node_id
            )));
        }

        edited.set_provenance(Some(Provenance {
            store: self.store_id,
            generation: copied_from,
        }));
        self.replace_node(edited)?;
        debug!(node = %id, copied_from, "node edited");
        Ok(())
    }

    fn insert_node(&self, mut node: Node) -> StoreResult<NodeId> {
        let mut inner = self.inner.write();
        inner.table.expand_if_needed()?;

        let idx = if node.node_id.is_null() {
            let (id, idx) = inner.assign_numeric_id()?;
            node.node_id = id;
            idx
        } else {
            match inner.table.find_free_slot(&node.node_id) {
                SlotSearch::Vacant(idx) => idx,
                SlotSearch::Duplicate => {
                    debug!(node = %node.node_id, "insert rejected: node id exists");
                    return Err(StoreError::AlreadyExists(node.node_id));
                }
                SlotSearch::Full => {
                    return Err(StoreError::Internal("node table is full".into()));
                }
            }
        };

        node.set_provenance(None);
        let id = node.node_id.clone();
        let class = node.class();
        let generation = inner.next_generation();
        inner.table.insert_at(
            idx,
            Entry {
                node: Arc::new(node),
                generation,
            },
        )?;
        debug!(node = %id, %class, generation, "node inserted");
        Ok(id)
    }

    fn replace_node(&self, mut node: Node) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let Some(idx) = inner.table.find(&node.node_id) else {
            debug!(node = %node.node_id, "replace rejected: node id unknown");
            return Err(StoreError::NodeIdUnknown(node.node_id));
        };
        let (resident_generation, resident_class) = match inner.table.entry(idx) {
            Some(entry) => (entry.generation, entry.node.class()),
            None => return Err(StoreError::NodeIdUnknown(node.node_id)),
        };

        match node.provenance() {
            Some(p) if p.store == self.store_id => {
                if p.generation != resident_generation {
                    warn!(
                        node = %node.node_id,
                        copied_from = p.generation,
                        resident = resident_generation,
                        "replace lost the race: node changed since it was copied"
                    );
                    return Err(StoreError::Superseded(node.node_id));
                }
            }
            _ => {
                warn!(node = %node.node_id, "replace rejected: node was not copied from this store");
                return Err(StoreError::ForeignCopy(node.node_id));
            }
        }
        if node.class() != resident_class {
            return Err(StoreError::ClassMismatch {
                id: node.node_id.clone(),
                expected: resident_class,
                found: node.class(),
            });
        }

        node.set_provenance(None);
        let id = node.node_id.clone();
        let generation = inner.next_generation();
        let previous = inner.table.replace_at(
            idx,
            Entry {
                node: Arc::new(node),
                generation,
            },
        )?;
        drop(inner);
        debug!(node = %id, generation, "node replaced");
        drop(previous);
        Ok(())
    }

    fn remove_node(&self, id: &NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let idx = inner
            .table
            .find(id)
            .ok_or_else(|| StoreError::NodeIdUnknown(id.clone()))?;
        let removed = inner.table.remove_at(idx)?;
        if let Err(e) = inner.table.shrink_if_needed() {
            warn!(error = %e, "node table shrink failed; keeping current capacity");
        }
        drop(inner);
        debug!(node = %id, "node removed");
        drop(removed);
        Ok(())
    }

    /// Visits a snapshot of the live nodes taken under the read lock. The
    /// lock is released before the first visit, so the visitor may call back
    /// into the store.
    fn iterate(&self, visitor: &mut dyn FnMut(&Node)) {
        let nodes: Vec<Arc<Node>> = self
            .inner
            .read()
            .table
            .iter()
            .map(|entry| Arc::clone(&entry.node))
            .collect();
        for node in &nodes {
            visitor(node);
        }
    }
}

impl std::fmt::Debug for HashMapNodestore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("HashMapNodestore")
            .field("store_id", &self.store_id)
            .field("node_count", &stats.live)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

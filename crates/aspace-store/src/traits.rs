use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use aspace_types::{NodeClass, NodeId};

use crate::error::StoreResult;
use crate::node::Node;

/// A read-only handle to a node returned by [`Nodestore::get_node`].
///
/// Hand it back with [`Nodestore::release_node`] when done. A handle to a
/// stored node keeps the node alive even if it is replaced or removed in the
/// meantime; a transient handle owns a node synthesized for this one call.
pub struct NodeRef {
    node: Arc<Node>,
    generation: Option<u64>,
}

impl NodeRef {
    /// Handle to a node resident in a store under `generation`.
    pub fn stored(node: Arc<Node>, generation: u64) -> Self {
        Self {
            node,
            generation: Some(generation),
        }
    }

    /// Handle owning a node that exists only for the caller.
    pub fn transient(node: Node) -> Self {
        Self {
            node: Arc::new(node),
            generation: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.generation.is_none()
    }

    /// The generation of the stored occupant this handle was taken from.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl Deref for NodeRef {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("node_id", &self.node.node_id)
            .field("class", &self.node.class())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Storage backend for address-space nodes.
///
/// Every backend must satisfy these invariants:
/// - At most one live node per NodeId.
/// - Operations that take a [`Node`] by value always consume it. On failure
///   the backend drops it; the caller never gets it back.
/// - `replace_node` installs a copy only if the occupant it was copied from
///   is still resident. A lost race is reported as
///   [`StoreError::Superseded`](crate::StoreError::Superseded) and the caller
///   re-reads and retries.
/// - `iterate` visits live nodes in an unspecified order that may change
///   across mutations.
pub trait Nodestore: Send + Sync {
    /// A bare node of `class`, owned by the caller.
    fn new_node(&self, class: NodeClass) -> Node {
        Node::new(class)
    }

    /// Dispose of a node the caller owns and will not insert.
    fn delete_node(&self, node: Node) {
        drop(node);
    }

    /// Borrow the node with `id`.
    fn get_node(&self, id: &NodeId) -> Option<NodeRef>;

    /// A detached, caller-owned copy of the node with `id`, tagged with the
    /// occupant it was copied from.
    fn get_node_copy(&self, id: &NodeId) -> Option<Node>;

    /// Give back a handle from [`get_node`](Self::get_node).
    fn release_node(&self, node: NodeRef) {
        drop(node);
    }

    /// Apply `edit` to the node with `id` and install the result.
    ///
    /// The closure runs without any store lock held and may read from or
    /// write to the store. If the node changes while the closure runs the
    /// edit is discarded with
    /// [`StoreError::Superseded`](crate::StoreError::Superseded), which callers may
    /// retry.
    fn edit_node(&self, id: &NodeId, edit: &mut dyn FnMut(&mut Node)) -> StoreResult<()>;

    /// Move a new node into the store and return its id. A null id is
    /// replaced with a freshly assigned numeric one.
    fn insert_node(&self, node: Node) -> StoreResult<NodeId>;

    /// Install a copy obtained from [`get_node_copy`](Self::get_node_copy).
    fn replace_node(&self, node: Node) -> StoreResult<()>;

    fn remove_node(&self, id: &NodeId) -> StoreResult<()>;

    /// Visit every live node.
    fn iterate(&self, visitor: &mut dyn FnMut(&Node));
}

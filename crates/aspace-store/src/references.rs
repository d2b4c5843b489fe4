//! Per-node reference arrays.
//!
//! References are grouped by (reference type, direction). Targets are weak
//! identities: an [`ExpandedNodeId`] names the target node, it never points
//! into it.

use aspace_types::{ExpandedNodeId, NodeId};

use crate::error::{StoreError, StoreResult};
use crate::node::Node;

/// All targets of one reference type in one direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceKind {
    pub reference_type_id: NodeId,
    pub is_inverse: bool,
    pub targets: Vec<ExpandedNodeId>,
}

impl ReferenceKind {
    fn matches(&self, reference_type_id: &NodeId, is_forward: bool) -> bool {
        self.is_inverse != is_forward && self.reference_type_id == *reference_type_id
    }
}

/// Which side of a reference to follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrowseDirection {
    Forward,
    Inverse,
    Both,
}

impl BrowseDirection {
    fn includes(self, is_inverse: bool) -> bool {
        match self {
            BrowseDirection::Forward => !is_inverse,
            BrowseDirection::Inverse => is_inverse,
            BrowseDirection::Both => true,
        }
    }
}

/// One edge yielded by [`Node::browse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceTarget<'a> {
    pub reference_type_id: &'a NodeId,
    pub is_forward: bool,
    pub target: &'a ExpandedNodeId,
}

impl Node {
    pub fn references(&self) -> &[ReferenceKind] {
        &self.references
    }

    /// Total number of targets across all reference kinds.
    pub fn reference_count(&self) -> usize {
        self.references.iter().map(|kind| kind.targets.len()).sum()
    }

    /// Add an edge. Fails if the exact edge already exists.
    pub fn add_reference(
        &mut self,
        reference_type_id: &NodeId,
        target: ExpandedNodeId,
        is_forward: bool,
    ) -> StoreResult<()> {
        if let Some(kind) = self
            .references
            .iter_mut()
            .find(|kind| kind.matches(reference_type_id, is_forward))
        {
            if kind.targets.contains(&target) {
                return Err(StoreError::DuplicateReference {
                    reference_type: reference_type_id.clone(),
                    target,
                });
            }
            kind.targets.try_reserve(1)?;
            kind.targets.push(target);
            return Ok(());
        }

        self.references.try_reserve(1)?;
        let mut targets = Vec::new();
        targets.try_reserve_exact(1)?;
        targets.push(target);
        self.references.push(ReferenceKind {
            reference_type_id: reference_type_id.clone(),
            is_inverse: !is_forward,
            targets,
        });
        Ok(())
    }

    /// Remove an edge. Returns `true` if it existed. A reference kind left
    /// without targets is dropped.
    pub fn delete_reference(
        &mut self,
        reference_type_id: &NodeId,
        target: &ExpandedNodeId,
        is_forward: bool,
    ) -> bool {
        let Some(pos) = self
            .references
            .iter()
            .position(|kind| kind.matches(reference_type_id, is_forward))
        else {
            return false;
        };
        let kind = &mut self.references[pos];
        let Some(target_pos) = kind.targets.iter().position(|t| t == target) else {
            return false;
        };
        kind.targets.remove(target_pos);
        if kind.targets.is_empty() {
            self.references.remove(pos);
        }
        true
    }

    pub fn has_reference(
        &self,
        reference_type_id: &NodeId,
        target: &ExpandedNodeId,
        is_forward: bool,
    ) -> bool {
        self.references
            .iter()
            .filter(|kind| kind.matches(reference_type_id, is_forward))
            .any(|kind| kind.targets.contains(target))
    }

    /// Edges in `direction`, optionally restricted to one reference type.
    ///
    /// Type matching is exact. Expanding a type to its subtypes needs the
    /// type hierarchy and is left to the caller.
    pub fn browse<'a>(
        &'a self,
        direction: BrowseDirection,
        reference_type_id: Option<&'a NodeId>,
    ) -> impl Iterator<Item = ReferenceTarget<'a>> + 'a {
        self.references
            .iter()
            .filter(move |kind| direction.includes(kind.is_inverse))
            .filter(move |kind| reference_type_id.map_or(true, |t| kind.reference_type_id == *t))
            .flat_map(|kind| {
                kind.targets.iter().map(move |target| ReferenceTarget {
                    reference_type_id: &kind.reference_type_id,
                    is_forward: !kind.is_inverse,
                    target,
                })
            })
    }
}

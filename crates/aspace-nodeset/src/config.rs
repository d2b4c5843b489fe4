use aspace_store::NodestoreConfig;
use aspace_types::{ns0, NodeId};
use serde::{Deserialize, Serialize};

/// How a nodeset document is turned into stored nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesetOptions {
    /// Add an inverse reference to the `ParentNodeId` when the node's own
    /// `References` do not already point back at its parent.
    pub synthesize_parent_reference: bool,
    /// Reference type used for a synthesized parent reference.
    pub parent_reference_type: NodeId,
    /// Skip element kinds the loader does not understand instead of failing.
    pub skip_unknown_elements: bool,
    /// Sizing of the table that holds the loaded nodes.
    pub table: NodestoreConfig,
}

impl Default for NodesetOptions {
    fn default() -> Self {
        Self {
            synthesize_parent_reference: true,
            parent_reference_type: ns0::HAS_COMPONENT,
            skip_unknown_elements: true,
            table: NodestoreConfig::default(),
        }
    }
}

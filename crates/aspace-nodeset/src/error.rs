use std::path::PathBuf;

use aspace_store::StoreError;
use aspace_types::{NodeId, StatusCode, TypeError};

/// Errors from loading a nodeset document.
#[derive(Debug, thiserror::Error)]
pub enum NodesetError {
    /// The document is not well-formed XML.
    #[error("malformed nodeset XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("failed to read nodeset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{element} is missing required attribute {attribute}")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("{element} has invalid {attribute} '{value}'")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
    },

    /// A namespace index with no entry in the document's NamespaceUris.
    #[error("namespace index {index} in '{value}' is not declared by the nodeset")]
    UnknownNamespace { index: u16, value: String },

    /// An element kind this loader does not understand, rejected because
    /// unknown elements are not being skipped.
    #[error("unsupported nodeset element <{0}>")]
    UnknownElement(String),

    #[error("invalid value for node {node}: {reason}")]
    InvalidValue { node: NodeId, reason: String },

    #[error("node id {0} is defined more than once")]
    DuplicateNode(NodeId),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl NodesetError {
    /// The OPC-UA status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            NodesetError::Io { .. } => StatusCode::BAD_RESOURCE_UNAVAILABLE,
            NodesetError::DuplicateNode(_) => StatusCode::BAD_NODE_ID_EXISTS,
            NodesetError::Store(e) => e.status_code(),
            _ => StatusCode::BAD_DECODING_ERROR,
        }
    }
}

pub type NodesetResult<T> = Result<T, NodesetError>;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid expanded node id: {0}")]
    InvalidExpandedNodeId(String),

    #[error("invalid qualified name: {0}")]
    InvalidQualifiedName(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("unknown node class mask: {0:#x}")]
    UnknownNodeClass(u32),
}

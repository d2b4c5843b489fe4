use std::collections::TryReserveError;

use aspace_types::{BuiltinType, ExpandedNodeId, NodeClass, NodeId, StatusCode};

/// Errors from node store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The insertion target id is already occupied.
    #[error("node id already exists: {0}")]
    AlreadyExists(NodeId),

    /// The replace/remove/edit target was not found.
    #[error("node id unknown: {0}")]
    NodeIdUnknown(NodeId),

    /// Allocation failed while copying a node, growing a reference array,
    /// or resizing the table.
    #[error("out of memory")]
    OutOfMemory,

    /// The occupant changed between `get_node_copy` and `replace_node`.
    #[error("node {0} changed since it was copied")]
    Superseded(NodeId),

    /// The submitted node was not copied from this store.
    #[error("node {0} was not copied from this store")]
    ForeignCopy(NodeId),

    /// A copy's class does not match the class of the node it replaces.
    #[error("node class mismatch for {id}: expected {expected}, found {found}")]
    ClassMismatch {
        id: NodeId,
        expected: NodeClass,
        found: NodeClass,
    },

    /// The operation does not apply to nodes of this class.
    #[error("operation invalid for {class} node {id}")]
    NodeClassInvalid { id: NodeId, class: NodeClass },

    /// The reference already exists on the node.
    #[error("duplicate reference of type {reference_type} to {target}")]
    DuplicateReference {
        reference_type: NodeId,
        target: ExpandedNodeId,
    },

    /// The backend does not support this operation.
    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    /// The node is owned by an external source and cannot be modified.
    #[error("node is not writable: {0}")]
    NotWritable(NodeId),

    /// A written value does not have the type the node accepts.
    #[error("value written to {id} must be {expected}")]
    TypeMismatch {
        id: NodeId,
        expected: BuiltinType,
    },

    /// Store configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// The OPC-UA status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::AlreadyExists(_) => StatusCode::BAD_NODE_ID_EXISTS,
            StoreError::NodeIdUnknown(_) => StatusCode::BAD_NODE_ID_UNKNOWN,
            StoreError::OutOfMemory => StatusCode::BAD_OUT_OF_MEMORY,
            StoreError::Superseded(_)
            | StoreError::ForeignCopy(_)
            | StoreError::ClassMismatch { .. }
            | StoreError::Internal(_) => StatusCode::BAD_INTERNAL_ERROR,
            StoreError::NodeClassInvalid { .. } => StatusCode::BAD_NODE_CLASS_INVALID,
            StoreError::DuplicateReference { .. } => {
                StatusCode::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED
            }
            StoreError::NotImplemented(_) => StatusCode::BAD_NOT_IMPLEMENTED,
            StoreError::NotWritable(_) => StatusCode::BAD_NOT_WRITABLE,
            StoreError::TypeMismatch { .. } => StatusCode::BAD_TYPE_MISMATCH,
            StoreError::InvalidConfig(_) => StatusCode::BAD_INVALID_ARGUMENT,
        }
    }

    /// Returns `true` if re-reading and retrying the write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Superseded(_))
    }
}

impl From<TryReserveError> for StoreError {
    fn from(_: TryReserveError) -> Self {
        StoreError::OutOfMemory
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        let id = NodeId::numeric(1, 1);
        assert_eq!(
            StoreError::AlreadyExists(id.clone()).status_code(),
            StatusCode::BAD_NODE_ID_EXISTS
        );
        assert_eq!(
            StoreError::NodeIdUnknown(id.clone()).status_code(),
            StatusCode::BAD_NODE_ID_UNKNOWN
        );
        assert_eq!(
            StoreError::Superseded(id.clone()).status_code(),
            StatusCode::BAD_INTERNAL_ERROR
        );
        assert_eq!(
            StoreError::ClassMismatch {
                id: id.clone(),
                expected: NodeClass::Object,
                found: NodeClass::Variable,
            }
            .status_code(),
            StatusCode::BAD_INTERNAL_ERROR
        );
        assert_eq!(
            StoreError::NotImplemented("insert_node").status_code(),
            StatusCode::BAD_NOT_IMPLEMENTED
        );
        assert_eq!(
            StoreError::NotWritable(id.clone()).status_code(),
            StatusCode::BAD_NOT_WRITABLE
        );
        assert_eq!(
            StoreError::TypeMismatch {
                id,
                expected: BuiltinType::String,
            }
            .status_code(),
            StatusCode::BAD_TYPE_MISMATCH
        );
    }

    #[test]
    fn only_lost_races_are_retryable() {
        let id = NodeId::numeric(1, 1);
        assert!(StoreError::Superseded(id.clone()).is_retryable());
        assert!(!StoreError::NodeIdUnknown(id.clone()).is_retryable());
        assert!(!StoreError::ForeignCopy(id).is_retryable());
    }

    #[test]
    fn try_reserve_failure_is_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::OutOfMemory));
    }
}

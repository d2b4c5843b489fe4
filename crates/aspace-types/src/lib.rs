//! Foundation types for the address-space node store.
//!
//! This crate provides the identity, naming, value, and status types shared by
//! every node store backend. Every other `aspace` crate depends on
//! `aspace-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] -- Namespaced node identity (numeric, string, GUID, or opaque)
//! - [`ExpandedNodeId`] -- NodeId plus optional namespace URI and server index
//! - [`QualifiedName`] / [`LocalizedText`] -- Browse and display names
//! - [`NodeClass`] -- Discriminant selecting one of the node variants
//! - [`Variant`] / [`DataValue`] -- Attribute values held by Variables
//! - [`StatusCode`] -- OPC-UA status codes reported by store operations

pub mod class;
pub mod error;
pub mod names;
pub mod node_id;
pub mod ns0;
pub mod status;
pub mod variant;

pub use class::NodeClass;
pub use error::TypeError;
pub use names::{LocalizedText, QualifiedName};
pub use node_id::{ExpandedNodeId, Identifier, NodeId};
pub use status::StatusCode;
pub use variant::{BuiltinType, DataValue, Variant};

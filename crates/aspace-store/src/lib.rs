//! Address-space node storage.
//!
//! This crate holds the nodes of an OPC-UA server's address space: the node
//! model, the open-addressing table that indexes nodes by [`NodeId`], and the
//! [`Nodestore`] interface every storage backend implements.
//!
//! # Node Model
//!
//! - [`Node`] -- common header plus a class-specific [`NodeAttributes`] payload
//! - [`ReferenceKind`] -- references grouped by type and direction
//! - [`ValueSource`] -- a Variable's stored value or its [`DataSource`]
//!
//! # Storage Backends
//!
//! All backends implement the [`Nodestore`] trait:
//!
//! - [`HashMapNodestore`] -- in-memory read/write store over a [`NodeTable`]
//!
//! # Update Rules
//!
//! 1. At most one live node per NodeId.
//! 2. Resident nodes are never mutated. Writers copy, edit, and install.
//! 3. A copy installs only if the node it was copied from is still resident.
//! 4. Nodes passed by value are consumed whether or not the call succeeds.
//! 5. A borrowed [`NodeRef`] stays valid after the node is replaced or removed.
//!
//! [`NodeId`]: aspace_types::NodeId

pub mod config;
pub mod error;
pub mod memory;
pub mod node;
pub mod references;
pub mod table;
pub mod traits;

pub use config::{NodestoreConfig, MAX_MIN_CAPACITY};
pub use error::{StoreError, StoreResult};
pub use memory::HashMapNodestore;
pub use node::{
    DataSource, Node, NodeAttributes, Provenance, ValueSource, VariableAttributes,
    ACCESS_LEVEL_READ, ACCESS_LEVEL_WRITE, VALUE_RANK_SCALAR,
};
pub use references::{BrowseDirection, ReferenceKind, ReferenceTarget};
pub use table::{NodeTable, TableStats};
pub use traits::{NodeRef, Nodestore};

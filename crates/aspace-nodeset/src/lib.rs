//! Read-only node store loaded from an OPC-UA XML nodeset.
//!
//! [`XmlNodestore`] parses a nodeset document once, resolving aliases and
//! remapping the document's namespace indices through a caller-supplied
//! callback, and then serves the parsed nodes through the
//! [`Nodestore`](aspace_store::Nodestore) interface. Writes are rejected
//! with `NotImplemented`.

pub mod config;
pub mod error;
mod parser;
pub mod store;

pub use config::NodesetOptions;
pub use error::{NodesetError, NodesetResult};
pub use store::XmlNodestore;

//! Ad-hoc node store over an external record table.
//!
//! [`AdhocNodestore`] shows how to put an external data source behind the
//! [`Nodestore`](aspace_store::Nodestore) interface: ids listed in a
//! [`RecordTable`] are answered by synthesizing nodes from their records,
//! and everything else goes to a wrapped fallback store.

pub mod record;
pub mod store;

pub use record::{BackendRecord, RecordTable};
pub use store::AdhocNodestore;

//! Backing stores for persisted provenance graphs.
//!
//! A [`GraphStore`] keeps [`SerializedGraph`](provenant_graph::SerializedGraph)
//! documents keyed by their descriptor id. Two stores ship with the crate:
//! [`MemoryGraphStore`] for tests and embedded use, and [`FileGraphStore`]
//! which keeps one JSON document per graph in a directory.
//!
//! Store implementations are expected to pass [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod file;
mod memory;
mod patch;
mod traits;

pub use error::StorageError;
pub use file::FileGraphStore;
pub use memory::MemoryGraphStore;
pub use patch::DescPatch;
pub use traits::GraphStore;

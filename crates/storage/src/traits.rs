use async_trait::async_trait;
use provenant_graph::{GraphDesc, SerializedGraph};

use crate::error::StorageError;
use crate::patch::DescPatch;

/// The storage trait for persisted provenance graphs.
///
/// A `GraphStore` keeps whole [`SerializedGraph`] documents keyed by
/// `desc.id`. Documents are replaced atomically: a reader observes either
/// the previous or the new version of a graph, never a mix.
///
/// ## Errors
///
/// - `get`, `update` and `update_desc` on an unknown id return
///   `Err(StorageError::NotFound)`.
/// - `insert` of an id that is already stored returns
///   `Err(StorageError::AlreadyExists)`.
/// - `delete` is idempotent and reports whether a graph was removed.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a store can be shared
/// between graph managers and async tasks.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// Descriptors of all stored graphs, ordered by id.
    async fn list(&self) -> Result<Vec<GraphDesc>, StorageError>;

    /// Load a complete graph document.
    async fn get(&self, id: &str) -> Result<SerializedGraph, StorageError>;

    /// Store a new graph under `graph.desc.id`.
    async fn insert(&self, graph: SerializedGraph) -> Result<GraphDesc, StorageError>;

    /// Replace an existing graph. The stored descriptor's `modified` time is
    /// refreshed.
    async fn update(&self, graph: SerializedGraph) -> Result<GraphDesc, StorageError>;

    /// Patch only the descriptor of a stored graph; nodes and edges are kept.
    async fn update_desc(&self, id: &str, patch: DescPatch) -> Result<GraphDesc, StorageError>;

    /// Remove a graph. Returns `false` if nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

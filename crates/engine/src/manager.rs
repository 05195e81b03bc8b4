//! Persistence boundary: graphs in and out of a [`GraphStore`].

use std::sync::Arc;

use provenant_graph::{GraphDesc, SerializedGraph};
use provenant_storage::{DescPatch, GraphStore, StorageError};

use crate::config::EngineConfig;
use crate::error::ProvenanceError;
use crate::provenance::ProvenanceGraph;
use crate::registry::CommandRegistry;

/// Attempts at minting an unused descriptor id.
const MINT_ATTEMPTS: usize = 4;

fn mint_id() -> String {
    format!("graph-{:016x}", rand::random::<u64>())
}

/// Lists, loads, stores, imports and clones provenance graphs.
///
/// Every graph the manager hands out shares its command registry and
/// configuration.
pub struct GraphManager<S: GraphStore> {
    store: Arc<S>,
    registry: CommandRegistry,
    config: EngineConfig,
}

impl<S: GraphStore> GraphManager<S> {
    pub fn new(store: S, registry: CommandRegistry, config: EngineConfig) -> Self {
        Self::with_shared_store(Arc::new(store), registry, config)
    }

    pub fn with_shared_store(store: Arc<S>, registry: CommandRegistry, config: EngineConfig) -> Self {
        GraphManager {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub async fn list(&self) -> Result<Vec<GraphDesc>, ProvenanceError> {
        Ok(self.store.list().await?)
    }

    /// Load a stored graph. Fails with `NotFound` if it no longer exists.
    pub async fn get(&self, id: &str) -> Result<ProvenanceGraph, ProvenanceError> {
        let serialized = self.store.get(id).await?;
        self.restore(&serialized)
    }

    /// Create and store a fresh, empty graph.
    pub async fn create(&self, name: impl Into<String>) -> Result<ProvenanceGraph, ProvenanceError> {
        let name = name.into();
        let graph = ProvenanceGraph::new(
            GraphDesc::new(String::new(), name, self.config.creator.clone()),
            self.registry.clone(),
            self.config.clone(),
        );
        let desc = self.insert_new(graph.persist()).await?;
        graph.set_desc(strip_current(desc));
        Ok(graph)
    }

    /// Remove a stored graph. Returns `false` if it was already gone.
    pub async fn delete(&self, id: &str) -> Result<bool, ProvenanceError> {
        let deleted = self.store.delete(id).await?;
        tracing::info!(graph = %id, deleted, "graph deleted");
        Ok(deleted)
    }

    /// Store a persisted graph under a new descriptor id and load it.
    ///
    /// The graph is validated before anything is stored: every command id it
    /// references must be registered, and its topology must be sound.
    /// `name` overrides the imported descriptor's name.
    pub async fn import(
        &self,
        mut serialized: SerializedGraph,
        name: Option<String>,
    ) -> Result<ProvenanceGraph, ProvenanceError> {
        self.restore(&serialized)?;
        if let Some(name) = name {
            serialized.desc.name = name;
        }
        serialized.desc.ts = provenant_graph::clock::now_rfc3339();
        serialized.desc.modified = None;
        let source = serialized.desc.id.clone();
        let desc = self.insert_new(serialized.clone()).await?;
        tracing::info!(graph = %desc.id, source = %source, "graph imported");
        serialized.desc = desc;
        self.restore(&serialized)
    }

    /// [`import`](Self::import) from a JSON document.
    pub async fn import_json(
        &self,
        json: &str,
        name: Option<String>,
    ) -> Result<ProvenanceGraph, ProvenanceError> {
        let serialized: SerializedGraph = serde_json::from_str(json)?;
        self.import(serialized, name).await
    }

    /// Store a deep copy of `graph` under a new descriptor.
    pub async fn clone_graph(
        &self,
        graph: &ProvenanceGraph,
        name: Option<String>,
    ) -> Result<ProvenanceGraph, ProvenanceError> {
        let mut serialized = graph.persist();
        let source = serialized.desc.id.clone();
        serialized.desc.name = name.unwrap_or_else(|| format!("Clone of {}", serialized.desc.name));
        serialized.desc.creator = self.config.creator.clone();
        serialized.desc.ts = provenant_graph::clock::now_rfc3339();
        serialized.desc.modified = None;
        let desc = self.insert_new(serialized.clone()).await?;
        tracing::info!(graph = %desc.id, source = %source, "graph cloned");
        serialized.desc = desc;
        self.restore(&serialized)
    }

    /// Update name, description or attributes of a stored graph.
    pub async fn edit(&self, id: &str, patch: DescPatch) -> Result<GraphDesc, ProvenanceError> {
        Ok(self.store.update_desc(id, patch).await?)
    }

    /// Write the full graph back to the store.
    ///
    /// Name, description and attributes are taken from the stored
    /// descriptor, so edits made through [`GraphManager::edit`] survive.
    pub async fn save(&self, graph: &ProvenanceGraph) -> Result<GraphDesc, ProvenanceError> {
        let serialized = self.with_stored_desc(graph.persist()).await?;
        let desc = self.store.update(serialized).await?;
        graph.set_desc(strip_current(desc.clone()));
        tracing::debug!(graph = %desc.id, "graph saved");
        Ok(desc)
    }

    /// Write only the compressed path to the current state back to the
    /// store. Branches, undo links and slides are discarded.
    pub async fn save_compacted(&self, graph: &ProvenanceGraph) -> Result<GraphDesc, ProvenanceError> {
        let serialized = self.with_stored_desc(graph.persist_compacted()?).await?;
        let desc = self.store.update(serialized).await?;
        graph.set_desc(strip_current(desc.clone()));
        tracing::debug!(graph = %desc.id, "compacted graph saved");
        Ok(desc)
    }

    async fn with_stored_desc(
        &self,
        mut serialized: SerializedGraph,
    ) -> Result<SerializedGraph, ProvenanceError> {
        let stored = strip_current(self.store.get(&serialized.desc.id).await?.desc);
        let current = serialized
            .desc
            .attrs
            .remove(crate::provenance::CURRENT_STATE_ATTR);
        serialized.desc.name = stored.name;
        serialized.desc.description = stored.description;
        serialized.desc.attrs = stored.attrs;
        if let Some(current) = current {
            serialized
                .desc
                .attrs
                .insert(crate::provenance::CURRENT_STATE_ATTR.to_string(), current);
        }
        Ok(serialized)
    }

    fn restore(&self, serialized: &SerializedGraph) -> Result<ProvenanceGraph, ProvenanceError> {
        ProvenanceGraph::restore(serialized, self.registry.clone(), self.config.clone())
    }

    async fn insert_new(&self, mut serialized: SerializedGraph) -> Result<GraphDesc, ProvenanceError> {
        for _ in 0..MINT_ATTEMPTS {
            serialized.desc.id = mint_id();
            match self.store.insert(serialized.clone()).await {
                Ok(desc) => {
                    tracing::info!(graph = %desc.id, name = %desc.name, "graph stored");
                    return Ok(desc);
                }
                Err(StorageError::AlreadyExists { id }) => {
                    tracing::debug!(graph = %id, "descriptor id taken, minting another");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ProvenanceError::Storage(StorageError::Backend(format!(
            "no free descriptor id after {MINT_ATTEMPTS} attempts"
        ))))
    }
}

fn strip_current(mut desc: GraphDesc) -> GraphDesc {
    desc.attrs.remove(crate::provenance::CURRENT_STATE_ATTR);
    desc
}

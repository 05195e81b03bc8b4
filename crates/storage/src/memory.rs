use std::collections::BTreeMap;

use async_trait::async_trait;
use provenant_graph::{GraphDesc, SerializedGraph};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::patch::DescPatch;
use crate::traits::GraphStore;

/// A [`GraphStore`] holding documents in process memory.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graphs: RwLock<BTreeMap<String, SerializedGraph>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.graphs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.graphs.read().await.is_empty()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn list(&self) -> Result<Vec<GraphDesc>, StorageError> {
        let graphs = self.graphs.read().await;
        Ok(graphs.values().map(|g| g.desc.clone()).collect())
    }

    async fn get(&self, id: &str) -> Result<SerializedGraph, StorageError> {
        let graphs = self.graphs.read().await;
        graphs
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn insert(&self, graph: SerializedGraph) -> Result<GraphDesc, StorageError> {
        let mut graphs = self.graphs.write().await;
        let id = graph.desc.id.clone();
        if id.is_empty() {
            return Err(StorageError::InvalidId { id });
        }
        if graphs.contains_key(&id) {
            return Err(StorageError::AlreadyExists { id });
        }
        let desc = graph.desc.clone();
        graphs.insert(id, graph);
        Ok(desc)
    }

    async fn update(&self, mut graph: SerializedGraph) -> Result<GraphDesc, StorageError> {
        let mut graphs = self.graphs.write().await;
        let slot = graphs
            .get_mut(&graph.desc.id)
            .ok_or_else(|| StorageError::NotFound {
                id: graph.desc.id.clone(),
            })?;
        graph.desc.touch();
        let desc = graph.desc.clone();
        *slot = graph;
        Ok(desc)
    }

    async fn update_desc(&self, id: &str, patch: DescPatch) -> Result<GraphDesc, StorageError> {
        let mut graphs = self.graphs.write().await;
        let graph = graphs
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
        patch.apply(&mut graph.desc);
        Ok(graph.desc.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.graphs.write().await.remove(id).is_some())
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use provenant_graph::{GraphDesc, SerializedGraph};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::patch::DescPatch;
use crate::traits::GraphStore;

const EXTENSION: &str = "json";

/// A [`GraphStore`] keeping one `<id>.json` document per graph in a
/// directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash never leaves a half-written document behind. Writers are
/// serialized within one store instance; sharing a directory between
/// processes is not supported.
#[derive(Debug)]
pub struct FileGraphStore {
    dir: PathBuf,
    writes: Mutex<()>,
}

impl FileGraphStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| backend(&dir, e))?;
        Ok(FileGraphStore {
            dir,
            writes: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidId { id: id.to_string() });
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    async fn read(&self, id: &str) -> Result<SerializedGraph, StorageError> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(backend(&path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write(&self, graph: &SerializedGraph) -> Result<(), StorageError> {
        let path = self.path_for(&graph.desc.id)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(graph)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| backend(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| backend(&path, e))?;
        tracing::debug!(id = %graph.desc.id, path = %path.display(), "graph written");
        Ok(())
    }
}

fn backend(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Backend(format!("{}: {err}", path.display()))
}

#[async_trait]
impl GraphStore for FileGraphStore {
    async fn list(&self) -> Result<Vec<GraphDesc>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| backend(&self.dir, e))?;
        let mut descs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| backend(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let bytes = tokio::fs::read(&path).await.map_err(|e| backend(&path, e))?;
            match serde_json::from_slice::<SerializedGraph>(&bytes) {
                Ok(graph) => descs.push(graph.desc),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable graph document");
                }
            }
        }
        descs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descs)
    }

    async fn get(&self, id: &str) -> Result<SerializedGraph, StorageError> {
        self.read(id).await
    }

    async fn insert(&self, graph: SerializedGraph) -> Result<GraphDesc, StorageError> {
        let _guard = self.writes.lock().await;
        let path = self.path_for(&graph.desc.id)?;
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| backend(&path, e))?
        {
            return Err(StorageError::AlreadyExists {
                id: graph.desc.id.clone(),
            });
        }
        self.write(&graph).await?;
        Ok(graph.desc)
    }

    async fn update(&self, mut graph: SerializedGraph) -> Result<GraphDesc, StorageError> {
        let _guard = self.writes.lock().await;
        // Only existence matters here; the stored content is replaced.
        self.read(&graph.desc.id).await?;
        graph.desc.touch();
        self.write(&graph).await?;
        Ok(graph.desc)
    }

    async fn update_desc(&self, id: &str, patch: DescPatch) -> Result<GraphDesc, StorageError> {
        let _guard = self.writes.lock().await;
        let mut graph = self.read(id).await?;
        patch.apply(&mut graph.desc);
        self.write(&graph).await?;
        Ok(graph.desc)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.writes.lock().await;
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(backend(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::open(dir.path()).await.unwrap();
        for id in ["", "../escape", "a/b", ".hidden"] {
            assert_eq!(
                store.get(id).await,
                Err(StorageError::InvalidId { id: id.to_string() })
            );
        }
    }

    #[tokio::test]
    async fn ignores_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGraphStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"hello")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("broken.json"), b"{")
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.get("broken").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileGraphStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }
}

use provenant_graph::{GraphError, NodeId};
use provenant_storage::StorageError;

use crate::command::CommandError;
use crate::config::ConfigError;
use crate::registry::RegistryError;

/// All errors surfaced by the provenance engine and the graph manager.
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    /// An `f_id` is not bound in the command registry, either when executing
    /// or when importing a persisted graph.
    #[error("unknown command: {f_id}")]
    UnknownCommand { f_id: String },

    /// A different implementation was registered under an existing id.
    #[error("a different command is already registered as {id}")]
    DuplicateRegistration { id: String },

    /// The jump target is not a state of this graph.
    #[error("state {state} is not reachable in this graph")]
    UnreachableState { state: NodeId },

    /// The graph descriptor does not exist in the backing store.
    #[error("graph not found: {id}")]
    NotFound { id: String },

    /// A command's own logic failed. The graph is left as it was before the
    /// failing command ran.
    #[error("command {f_id} failed: {source}")]
    CommandExecution {
        f_id: String,
        #[source]
        source: CommandError,
    },

    /// An action input has no live handle, typically an object of a
    /// restored graph that was never bound or replayed. Nothing is executed.
    #[error("command {f_id} received detached object {hash}")]
    DetachedInput { f_id: String, hash: String },

    /// An action recorded without an inverse cannot be undone or replayed
    /// backwards.
    #[error("action {action} has no stored inverse")]
    MissingInverse { action: NodeId },

    /// A graph mutation was issued from inside a command the same graph is
    /// running.
    #[error("graph mutation issued from inside a running command")]
    Reentrant,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Storage(StorageError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<RegistryError> for ProvenanceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownCommand { id } => ProvenanceError::UnknownCommand { f_id: id },
            RegistryError::DuplicateRegistration { id } => {
                ProvenanceError::DuplicateRegistration { id }
            }
        }
    }
}

impl From<StorageError> for ProvenanceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ProvenanceError::NotFound { id },
            other => ProvenanceError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        ProvenanceError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err: ProvenanceError = StorageError::NotFound { id: "g".into() }.into();
        assert!(matches!(err, ProvenanceError::NotFound { id } if id == "g"));

        let err: ProvenanceError = StorageError::Backend("disk full".into()).into();
        assert!(matches!(err, ProvenanceError::Storage(StorageError::Backend(_))));
    }

    #[test]
    fn registry_errors_keep_their_meaning() {
        let err: ProvenanceError = RegistryError::UnknownCommand { id: "f".into() }.into();
        assert_eq!(err.to_string(), "unknown command: f");
        let err: ProvenanceError = RegistryError::DuplicateRegistration { id: "f".into() }.into();
        assert!(matches!(err, ProvenanceError::DuplicateRegistration { .. }));
    }
}

use crate::graph::{NodeId, NodeKind};

/// Structural errors raised by [`Graph`](crate::Graph) operations and by
/// rebuilding a graph from its persisted form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No live node with this id exists in the graph.
    #[error("unknown node: {id}")]
    UnknownNode { id: NodeId },

    /// A node exists but belongs to a different dimension than required.
    #[error("node {id} is not a {expected} node")]
    WrongKind { id: NodeId, expected: NodeKind },

    /// An action tried to create an object that an earlier action on the same
    /// path already created.
    #[error("object {object} is already created on the path to state {state}")]
    DuplicateCreation { object: NodeId, state: NodeId },

    /// A slide cannot be positioned relative to itself or an unrelated node.
    #[error("invalid slide position for slide {slide}: {message}")]
    InvalidSlidePosition { slide: NodeId, message: String },

    /// The persisted node/edge list does not describe a valid provenance graph.
    #[error("malformed graph: {message}")]
    Malformed { message: String },
}

/// Errors returned when resolving the value behind an
/// [`ObjectRef`](crate::ObjectRef).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The handle was restored from storage and no replayed action has bound
    /// a value to it yet.
    #[error("object '{name}' has no value bound (restored but not replayed)")]
    Detached { name: String },

    /// The lazy loader of the handle failed.
    #[error("loading object '{name}' failed: {message}")]
    Load { name: String, message: String },

    /// The value exists but has a different runtime type.
    #[error("object '{name}' does not hold a value of the requested type")]
    TypeMismatch { name: String },
}

//! Provenance graph data model.
//!
//! A provenance graph records every executed user action as an [`ActionNode`]
//! together with the [`ObjectNode`]s it requires, creates and removes, the
//! [`StateNode`] checkpoints the actions lead to, and curated [`SlideNode`]
//! chains used for story playback.
//!
//! All four dimensions share a single [`NodeId`] space and live in an
//! append-only arena ([`Graph`]). Links between nodes are stored as id lists
//! on the nodes themselves; the typed edge list of the persisted wire format
//! ([`SerializedGraph`]) is derived from them on demand.
//!
//! This crate is purely structural. Executing actions, undo and replay live in
//! `provenant-engine`.

pub mod action;
pub mod clock;
pub mod error;
pub mod graph;
pub mod object;
pub mod serialize;
pub mod slide;
pub mod state;

pub use action::{
    ActionCategory, ActionDescriptor, ActionMetaData, ActionNode, ActionOperation, InverseAction,
    NewAction, Parameters,
};
pub use error::{GraphError, ResolveError};
pub use graph::{Edge, EdgeKind, Graph, Node, NodeId, NodeKind, SlidePosition};
pub use object::{ObjectCategory, ObjectNode, ObjectRef, ObjectValue};
pub use serialize::{GraphDesc, SerializedEdge, SerializedGraph, SerializedNode};
pub use slide::{NewSlide, SlideNode, DEFAULT_SLIDE_DURATION_MS};
pub use state::StateNode;

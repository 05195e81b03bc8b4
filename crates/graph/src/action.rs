//! Action metadata, descriptors and recorded action nodes.

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::graph::NodeId;
use crate::object::ObjectRef;

/// Plain JSON parameters of an action. Being a JSON map, parameters are
/// always serializable and acyclic.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Data,
    Visual,
    Selection,
    Layout,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOperation {
    Create,
    Update,
    Remove,
}

/// Human-facing description of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetaData {
    /// Display name; may embed operand names.
    pub name: String,
    pub category: ActionCategory,
    pub operation: ActionOperation,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ActionMetaData {
    /// Metadata stamped with the current time.
    pub fn new(name: impl Into<String>, category: ActionCategory, operation: ActionOperation) -> Self {
        Self::at(name, category, operation, clock::now_millis())
    }

    pub fn at(
        name: impl Into<String>,
        category: ActionCategory,
        operation: ActionOperation,
        timestamp: i64,
    ) -> Self {
        ActionMetaData {
            name: name.into(),
            category,
            operation,
            timestamp,
        }
    }
}

/// An action that has not been executed yet: what callers push and what
/// commands return as their inverse.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub f_id: String,
    pub meta: ActionMetaData,
    pub parameter: Parameters,
    pub inputs: Vec<ObjectRef>,
}

impl ActionDescriptor {
    pub fn new(f_id: impl Into<String>, meta: ActionMetaData) -> Self {
        ActionDescriptor {
            f_id: f_id.into(),
            meta,
            parameter: Parameters::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameter.insert(key.into(), value);
        self
    }

    pub fn with_parameters(mut self, parameter: Parameters) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_input(mut self, input: ObjectRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = ObjectRef>) -> Self {
        self.inputs.extend(inputs);
        self
    }
}

/// The stored, serializable inverse of an executed action. Inputs are object
/// node ids of the owning graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseAction {
    pub f_id: String,
    pub meta: ActionMetaData,
    #[serde(default)]
    pub parameter: Parameters,
    #[serde(default)]
    pub inputs: Vec<NodeId>,
}

/// Input to [`Graph::add_action`](crate::Graph::add_action).
#[derive(Debug, Clone)]
pub struct NewAction {
    pub f_id: String,
    pub meta: ActionMetaData,
    pub parameter: Parameters,
    pub requires: Vec<NodeId>,
    pub creates: Vec<NodeId>,
    pub removes: Vec<NodeId>,
    pub inverse: Option<InverseAction>,
    /// Set when this action is the undo of an earlier one.
    pub inverses: Option<NodeId>,
}

/// A recorded, executed action.
///
/// Structure (`f_id`, parameters, object links) never changes after
/// recording. `attrs` and the stored `inverse` are annotations and may be
/// refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub id: NodeId,
    pub f_id: String,
    pub meta: ActionMetaData,
    pub parameter: Parameters,
    pub requires: Vec<NodeId>,
    pub creates: Vec<NodeId>,
    pub removes: Vec<NodeId>,
    pub inverse: Option<InverseAction>,
    /// The action this one undoes, if it was produced by an undo.
    pub inverses: Option<NodeId>,
    /// The state this action was executed from.
    pub parent: NodeId,
    /// The state this action leads to.
    pub resulted_in: NodeId,
    pub attrs: Parameters,
}

impl ActionNode {
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

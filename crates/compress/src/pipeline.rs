//! Configurable chains of compression steps.

use std::panic::{catch_unwind, AssertUnwindSafe};

use provenant_graph::{ActionNode, NodeId};
use serde::{Deserialize, Serialize};

use crate::consecutive::last_consecutive;
use crate::create_remove::create_remove;
use crate::last_only::last_only;
use crate::shape::ActionShape;

fn default_per_object() -> bool {
    true
}

/// A declarative compression step, as written in configuration:
///
/// ```toml
/// [[compression]]
/// kind = "last_only"
/// function_id = "setParameter"
/// key = "/name"
///
/// [[compression]]
/// kind = "create_remove"
/// create = "addView"
/// remove = "removeView"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompressionRule {
    LastOnly {
        function_id: String,
        /// JSON pointer into the action parameter; absent means one key for
        /// all actions of the command.
        #[serde(default)]
        key: Option<String>,
        /// Include the required objects in the key.
        #[serde(default = "default_per_object")]
        per_object: bool,
    },
    LastConsecutive {
        function_id: String,
        #[serde(default)]
        key: Option<String>,
        #[serde(default = "default_per_object")]
        per_object: bool,
    },
    CreateRemove {
        create: String,
        remove: String,
    },
}

/// Grouping key built from the required objects and one parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    objects: Vec<NodeId>,
    value: String,
}

fn rule_key<A: ActionShape>(action: &A, pointer: Option<&str>, per_object: bool) -> RuleKey {
    let value = match pointer {
        Some(pointer) => {
            let parameter = serde_json::Value::Object(action.parameter().clone());
            parameter
                .pointer(pointer)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
                .to_string()
        }
        None => String::new(),
    };
    RuleKey {
        objects: if per_object {
            action.requires().to_vec()
        } else {
            Vec::new()
        },
        value,
    }
}

impl CompressionRule {
    pub fn apply<A: ActionShape + Clone>(&self, path: &[A]) -> Vec<A> {
        match self {
            CompressionRule::LastOnly {
                function_id,
                key,
                per_object,
            } => last_only(path, function_id, |a: &A| {
                rule_key(a, key.as_deref(), *per_object)
            }),
            CompressionRule::LastConsecutive {
                function_id,
                key,
                per_object,
            } => last_consecutive(path, function_id, |a: &A| {
                rule_key(a, key.as_deref(), *per_object)
            }),
            CompressionRule::CreateRemove { create, remove } => create_remove(path, create, remove),
        }
    }

    fn label(&self) -> String {
        match self {
            CompressionRule::LastOnly { function_id, .. } => format!("last_only({function_id})"),
            CompressionRule::LastConsecutive { function_id, .. } => {
                format!("last_consecutive({function_id})")
            }
            CompressionRule::CreateRemove { create, remove } => {
                format!("create_remove({create}, {remove})")
            }
        }
    }
}

/// One step of a [`CompressionPipeline`].
pub trait Compressor: Send + Sync {
    fn name(&self) -> &str;

    fn compress(&self, path: &[ActionNode]) -> Vec<ActionNode>;
}

/// A [`Compressor`] backed by a declarative rule.
#[derive(Debug, Clone)]
pub struct RuleCompressor {
    rule: CompressionRule,
    label: String,
}

impl RuleCompressor {
    pub fn new(rule: CompressionRule) -> Self {
        let label = rule.label();
        RuleCompressor { rule, label }
    }
}

impl Compressor for RuleCompressor {
    fn name(&self) -> &str {
        &self.label
    }

    fn compress(&self, path: &[ActionNode]) -> Vec<ActionNode> {
        self.rule.apply(path)
    }
}

/// An ordered chain of compressors.
///
/// A step that panics (for instance a custom compressor with a broken key
/// function) is skipped with a warning; compression is an optimization and
/// never fails the caller.
#[derive(Default)]
pub struct CompressionPipeline {
    steps: Vec<Box<dyn Compressor>>,
}

impl CompressionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &[CompressionRule]) -> Self {
        let mut pipeline = Self::new();
        for rule in rules {
            pipeline.push(Box::new(RuleCompressor::new(rule.clone())));
        }
        pipeline
    }

    pub fn push(&mut self, step: Box<dyn Compressor>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply(&self, path: &[ActionNode]) -> Vec<ActionNode> {
        let mut current = path.to_vec();
        for step in &self.steps {
            match catch_unwind(AssertUnwindSafe(|| step.compress(&current))) {
                Ok(next) => {
                    tracing::debug!(
                        step = step.name(),
                        before = current.len(),
                        after = next.len(),
                        "compression step applied"
                    );
                    current = next;
                }
                Err(_) => {
                    tracing::warn!(step = step.name(), "compression step panicked, skipped");
                }
            }
        }
        current
    }
}

impl std::fmt::Debug for CompressionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| s.name()))
            .finish()
    }
}

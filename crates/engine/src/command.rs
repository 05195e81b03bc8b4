//! The command contract: what registered plugins implement.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use provenant_graph::{ActionDescriptor, ObjectRef, Parameters, ResolveError};

/// Execution context handed to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    /// Descriptor id of the graph running the command.
    pub graph_id: String,
    /// `true` while replaying recorded actions during `jump_to`. Commands may
    /// skip side effects that must only happen once, such as telemetry.
    pub replaying: bool,
}

/// What a command reports back after running.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Objects the command brought into existence.
    pub created: Vec<ObjectRef>,
    /// Inputs the command destroyed.
    pub removed: Vec<ObjectRef>,
    /// The action that undoes this one.
    pub inverse: ActionDescriptor,
    /// Optional payload for the caller; not persisted.
    pub result: Option<serde_json::Value>,
}

impl CommandOutcome {
    pub fn new(inverse: ActionDescriptor) -> Self {
        CommandOutcome {
            created: Vec::new(),
            removed: Vec::new(),
            inverse,
            result: None,
        }
    }

    pub fn created(mut self, object: ObjectRef) -> Self {
        self.created.push(object);
        self
    }

    pub fn removed(mut self, object: ObjectRef) -> Self {
        self.removed.push(object);
        self
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Failure raised by a command's own logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        CommandError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ResolveError> for CommandError {
    fn from(err: ResolveError) -> Self {
        CommandError::new(err.to_string())
    }
}

/// An executable step registered under a stable `f_id`.
///
/// Commands must not alter graph structure themselves; the engine records
/// the outcome. A command that returns an error must leave its inputs as it
/// found them.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(
        &self,
        inputs: &[ObjectRef],
        parameter: &Parameters,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError>;
}

struct FnCommand<F>(F);

#[async_trait]
impl<F, Fut> Command for FnCommand<F>
where
    F: Fn(Vec<ObjectRef>, Parameters, CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CommandOutcome, CommandError>> + Send + 'static,
{
    async fn execute(
        &self,
        inputs: &[ObjectRef],
        parameter: &Parameters,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome, CommandError> {
        (self.0)(inputs.to_vec(), parameter.clone(), ctx.clone()).await
    }
}

/// Wrap an async closure as a [`Command`].
pub fn command_fn<F, Fut>(f: F) -> Arc<dyn Command>
where
    F: Fn(Vec<ObjectRef>, Parameters, CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CommandOutcome, CommandError>> + Send + 'static,
{
    Arc::new(FnCommand(f))
}

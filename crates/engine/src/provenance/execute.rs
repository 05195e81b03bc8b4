//! Executing, undoing and replaying actions.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;

use provenant_graph::{
    ActionDescriptor, ActionMetaData, ActionNode, Graph, GraphError, InverseAction, NewAction,
    NodeId, ObjectRef, Parameters,
};
use tokio::sync::MutexGuard;

use super::ProvenanceGraph;
use crate::command::{Command, CommandContext, CommandError, CommandOutcome};
use crate::error::ProvenanceError;
use crate::events::GraphEvent;

tokio::task_local! {
    /// Instances of graphs whose commands are running on this task.
    static RUNNING: Vec<u64>;
}

/// Held for the duration of one queued mutation.
struct OpGuard<'a> {
    _ops: MutexGuard<'a, ()>,
    graph: &'a ProvenanceGraph,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.graph.busy.store(false, Ordering::SeqCst);
    }
}

struct Executed {
    node: ActionNode,
    from: NodeId,
    to: NodeId,
}

/// A jump: actions to revert (current state first) and actions to replay
/// (oldest first).
struct JumpPlan {
    backward: Vec<NodeId>,
    forward: Vec<NodeId>,
}

impl ProvenanceGraph {
    async fn begin(&self) -> Result<OpGuard<'_>, ProvenanceError> {
        let nested = RUNNING
            .try_with(|running| running.contains(&self.instance))
            .unwrap_or(false);
        if nested {
            return Err(ProvenanceError::Reentrant);
        }
        let ops = self.ops.lock().await;
        self.busy.store(true, Ordering::SeqCst);
        Ok(OpGuard {
            _ops: ops,
            graph: self,
        })
    }

    async fn run_command(
        &self,
        f_id: &str,
        command: &Arc<dyn Command>,
        inputs: &[ObjectRef],
        parameter: &Parameters,
        replaying: bool,
    ) -> Result<CommandOutcome, ProvenanceError> {
        let ctx = CommandContext {
            graph_id: self.id(),
            replaying,
        };
        let mut running = RUNNING.try_with(|r| r.clone()).unwrap_or_default();
        running.push(self.instance);
        let run = AssertUnwindSafe(command.execute(inputs, parameter, &ctx)).catch_unwind();
        let result = match RUNNING.scope(running, run).await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    graph = %ctx.graph_id,
                    f_id = %f_id,
                    panic = %message,
                    "command panicked"
                );
                Err(CommandError::new(format!("command panicked: {message}")))
            }
        };
        result.map_err(|source| ProvenanceError::CommandExecution {
            f_id: f_id.to_string(),
            source,
        })
    }

    // ── Execute ──────────────────────────────────────────────────────────────

    /// Execute an action from the current state and record it.
    ///
    /// On success a new action and state are appended and the new state
    /// becomes current. If the command fails, nothing is recorded and the
    /// current state does not move.
    pub async fn push(&self, action: ActionDescriptor) -> Result<ActionNode, ProvenanceError> {
        let _op = self.begin().await?;
        let executed = self.execute_locked(action, None).await?;
        self.emit(GraphEvent::Execute {
            action: executed.node.id,
            state: executed.to,
        });
        self.emit(GraphEvent::StateChanged {
            from: executed.from,
            to: executed.to,
        });
        Ok(executed.node)
    }

    pub async fn execute(
        &self,
        f_id: impl Into<String>,
        meta: ActionMetaData,
        inputs: Vec<ObjectRef>,
        parameter: Parameters,
    ) -> Result<ActionNode, ProvenanceError> {
        self.push(ActionDescriptor {
            f_id: f_id.into(),
            meta,
            parameter,
            inputs,
        })
        .await
    }

    /// Execute several actions as one queued operation.
    ///
    /// Unknown command ids are rejected before anything runs. If a command
    /// fails midway, the actions before it stay recorded and the error is
    /// returned.
    pub async fn run_chain(
        &self,
        actions: Vec<ActionDescriptor>,
    ) -> Result<Vec<ActionNode>, ProvenanceError> {
        let _op = self.begin().await?;
        self.registry
            .check_all(actions.iter().map(|a| a.f_id.as_str()))?;
        let from = self.current_state();
        let mut done = Vec::with_capacity(actions.len());
        let mut failure = None;
        for action in actions {
            match self.execute_locked(action, None).await {
                Ok(executed) => {
                    self.emit(GraphEvent::Execute {
                        action: executed.node.id,
                        state: executed.to,
                    });
                    done.push(executed.node);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let to = self.current_state();
        if to != from {
            self.emit(GraphEvent::StateChanged { from, to });
        }
        if !done.is_empty() {
            self.emit(GraphEvent::RunChain {
                actions: done.iter().map(|a| a.id).collect(),
            });
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(done),
        }
    }

    async fn execute_locked(
        &self,
        action: ActionDescriptor,
        inverses: Option<NodeId>,
    ) -> Result<Executed, ProvenanceError> {
        let command = self.registry.lookup(&action.f_id)?;
        if let Some(detached) = action.inputs.iter().find(|o| o.is_detached()) {
            return Err(ProvenanceError::DetachedInput {
                f_id: action.f_id.clone(),
                hash: detached.hash().to_string(),
            });
        }
        let outcome = self
            .run_command(&action.f_id, &command, &action.inputs, &action.parameter, false)
            .await?;

        let mut inner = self.write_inner();
        let from = inner.current;
        let (action_id, state) = record(&mut inner.graph, from, &action, &outcome, inverses)?;
        inner.graph.mark_visited(state)?;
        inner.move_to(state);
        let node = inner.graph.expect_action(action_id)?.clone();
        tracing::debug!(
            graph = %inner.desc.id,
            f_id = %node.f_id,
            action = %action_id,
            state = %state,
            "action executed"
        );
        Ok(Executed {
            node,
            from,
            to: state,
        })
    }

    // ── Undo ─────────────────────────────────────────────────────────────────

    /// Execute the stored inverse of the action that produced the current
    /// state, recording it as a new action linked to the one it undoes.
    ///
    /// Returns `None` at the root.
    pub async fn undo(&self) -> Result<Option<ActionNode>, ProvenanceError> {
        let _op = self.begin().await?;
        let (target, descriptor) = {
            let inner = self.read_inner();
            let state = inner.graph.expect_state(inner.current)?;
            let Some(action_id) = state.resulting_from else {
                return Ok(None);
            };
            let action = inner.graph.expect_action(action_id)?;
            let inverse = action
                .inverse
                .as_ref()
                .ok_or(ProvenanceError::MissingInverse { action: action_id })?;
            (action_id, inverse_descriptor(&inner.graph, inverse)?)
        };
        let executed = self.execute_locked(descriptor, Some(target)).await?;
        self.emit(GraphEvent::Execute {
            action: executed.node.id,
            state: executed.to,
        });
        self.emit(GraphEvent::StateChanged {
            from: executed.from,
            to: executed.to,
        });
        Ok(Some(executed.node))
    }

    // ── Jump ─────────────────────────────────────────────────────────────────

    /// Move to any state of this graph without recording new actions.
    ///
    /// The stored inverses of the actions between the current state and the
    /// lowest common ancestor are executed newest first, then the recorded
    /// actions from the ancestor to `target` are replayed. Replayed actions
    /// re-bind the objects they create and refresh their stored inverse.
    ///
    /// If a command fails, the graph stays at the last state reached and the
    /// error is returned.
    pub async fn jump_to(&self, target: NodeId) -> Result<(), ProvenanceError> {
        let _op = self.begin().await?;
        let (from, plan) = {
            let mut inner = self.write_inner();
            if inner.graph.state(target).is_none() {
                return Err(ProvenanceError::UnreachableState { state: target });
            }
            if inner.current == target {
                inner.move_to(target);
                return Ok(());
            }
            (inner.current, self.plan_jump(&inner.graph, inner.current, target)?)
        };

        let mut replayed = Vec::new();
        let result = self.replay(&plan, target, &mut replayed).await;

        let to = self.current_state();
        if !replayed.is_empty() {
            self.emit(GraphEvent::RunChain { actions: replayed });
        }
        if to != from {
            self.emit(GraphEvent::StateChanged { from, to });
        }
        tracing::debug!(
            graph = %self.id(),
            from = %from,
            to = %to,
            target = %target,
            ok = result.is_ok(),
            "jump finished"
        );
        result
    }

    fn plan_jump(
        &self,
        graph: &Graph,
        current: NodeId,
        target: NodeId,
    ) -> Result<JumpPlan, ProvenanceError> {
        let lca = graph.lowest_common_ancestor(current, target)?;
        let mut backward = actions_between(graph, lca, current)?;
        backward.reverse();
        let mut forward = actions_between(graph, lca, target)?;

        for id in &backward {
            let action = graph.expect_action(*id)?;
            let inverse = action
                .inverse
                .as_ref()
                .ok_or(ProvenanceError::MissingInverse { action: *id })?;
            self.registry.lookup(&inverse.f_id)?;
        }
        for id in &forward {
            self.registry.lookup(&graph.expect_action(*id)?.f_id)?;
        }

        if self.config.compress_replay && !forward.is_empty() {
            let path = super::collect_actions(graph, &forward)?;
            forward = self.pipeline.apply(&path).iter().map(|a| a.id).collect();
        }
        Ok(JumpPlan { backward, forward })
    }

    async fn replay(
        &self,
        plan: &JumpPlan,
        target: NodeId,
        replayed: &mut Vec<NodeId>,
    ) -> Result<(), ProvenanceError> {
        for &action_id in &plan.backward {
            let (descriptor, parent) = {
                let inner = self.read_inner();
                let action = inner.graph.expect_action(action_id)?;
                let inverse = action
                    .inverse
                    .as_ref()
                    .ok_or(ProvenanceError::MissingInverse { action: action_id })?;
                (inverse_descriptor(&inner.graph, inverse)?, action.parent)
            };
            let command = self.registry.lookup(&descriptor.f_id)?;
            self.run_command(
                &descriptor.f_id,
                &command,
                &descriptor.inputs,
                &descriptor.parameter,
                true,
            )
            .await?;
            self.write_inner().move_to(parent);
        }

        for &action_id in &plan.forward {
            let (f_id, inputs, parameter) = {
                let inner = self.read_inner();
                let action = inner.graph.expect_action(action_id)?;
                (
                    action.f_id.clone(),
                    object_handles(&inner.graph, &action.requires)?,
                    action.parameter.clone(),
                )
            };
            let command = self.registry.lookup(&f_id)?;
            let outcome = self
                .run_command(&f_id, &command, &inputs, &parameter, true)
                .await?;

            let mut inner = self.write_inner();
            let state = rebind(&mut inner.graph, action_id, &outcome)?;
            inner.graph.mark_visited(state)?;
            inner.move_to(state);
            replayed.push(action_id);
        }

        let mut inner = self.write_inner();
        inner.graph.mark_visited(target)?;
        inner.move_to(target);
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Recording helpers ────────────────────────────────────────────────────────

/// Append the outcome of an executed action under `parent`.
fn record(
    graph: &mut Graph,
    parent: NodeId,
    action: &ActionDescriptor,
    outcome: &CommandOutcome,
    inverses: Option<NodeId>,
) -> Result<(NodeId, NodeId), GraphError> {
    let requires: Vec<NodeId> = action
        .inputs
        .iter()
        .map(|o| graph.find_or_add_object(o))
        .collect();

    // An existing node is reused for a created object only if it is not
    // alive in the parent state and was not created on the way there.
    let alive = graph.expect_state(parent)?.consists_of.clone();
    let created_on_path = graph.objects_created_on_path(parent)?;
    let mut creates = Vec::with_capacity(outcome.created.len());
    for object in &outcome.created {
        let reusable = graph
            .find_object_by_hash(object.hash())
            .map(|o| o.id)
            .filter(|id| {
                !alive.contains(id) && !created_on_path.contains(id) && !creates.contains(id)
            });
        let id = match reusable {
            Some(id) => {
                graph.bind_object(id, object.clone())?;
                id
            }
            None => graph.add_object(object.clone()),
        };
        creates.push(id);
    }

    let removes: Vec<NodeId> = outcome
        .removed
        .iter()
        .map(|o| locate(graph, o, &requires))
        .collect();
    let inverse = stored_inverse(
        graph,
        &outcome.inverse,
        &[requires.as_slice(), creates.as_slice(), removes.as_slice()],
    );

    graph.add_action(
        parent,
        NewAction {
            f_id: action.f_id.clone(),
            meta: action.meta.clone(),
            parameter: action.parameter.clone(),
            requires,
            creates,
            removes,
            inverse: Some(inverse),
            inverses,
        },
        action.meta.name.clone(),
    )
}

/// Bind the objects a replayed action produced and refresh its inverse.
/// Returns the state the action leads to.
fn rebind(
    graph: &mut Graph,
    action_id: NodeId,
    outcome: &CommandOutcome,
) -> Result<NodeId, GraphError> {
    let action = graph.expect_action(action_id)?.clone();
    if outcome.created.len() != action.creates.len() {
        tracing::warn!(
            action = %action_id,
            f_id = %action.f_id,
            recorded = action.creates.len(),
            replayed = outcome.created.len(),
            "replay created a different number of objects"
        );
    }
    for (id, object) in action.creates.iter().zip(&outcome.created) {
        let recorded = graph.expect_object(*id)?.hash().to_string();
        if recorded != object.hash() {
            tracing::warn!(
                object = %id,
                recorded = %recorded,
                replayed = %object.hash(),
                "object hash mismatch during replay"
            );
        }
        graph.bind_object(*id, object.clone())?;
    }
    let inverse = stored_inverse(
        graph,
        &outcome.inverse,
        &[
            action.requires.as_slice(),
            action.creates.as_slice(),
            action.removes.as_slice(),
        ],
    );
    graph.set_inverse(action_id, Some(inverse))?;
    Ok(action.resulted_in)
}

fn stored_inverse(graph: &mut Graph, inverse: &ActionDescriptor, scope: &[&[NodeId]]) -> InverseAction {
    let preferred: Vec<NodeId> = scope.iter().flat_map(|ids| ids.iter().copied()).collect();
    InverseAction {
        f_id: inverse.f_id.clone(),
        meta: inverse.meta.clone(),
        parameter: inverse.parameter.clone(),
        inputs: inverse
            .inputs
            .iter()
            .map(|o| locate(graph, o, &preferred))
            .collect(),
    }
}

/// The node for `object`: one of `preferred` with the same hash, else any
/// node with that hash, else a new node.
fn locate(graph: &mut Graph, object: &ObjectRef, preferred: &[NodeId]) -> NodeId {
    let hit = preferred.iter().copied().find(|id| {
        graph
            .object(*id)
            .is_some_and(|o| o.hash() == object.hash())
    });
    match hit {
        Some(id) => id,
        None => graph.find_or_add_object(object),
    }
}

fn inverse_descriptor(graph: &Graph, inverse: &InverseAction) -> Result<ActionDescriptor, GraphError> {
    Ok(ActionDescriptor {
        f_id: inverse.f_id.clone(),
        meta: inverse.meta.clone(),
        parameter: inverse.parameter.clone(),
        inputs: object_handles(graph, &inverse.inputs)?,
    })
}

fn object_handles(graph: &Graph, ids: &[NodeId]) -> Result<Vec<ObjectRef>, GraphError> {
    ids.iter()
        .map(|id| Ok(graph.expect_object(*id)?.object.clone()))
        .collect()
}

/// Actions from `ancestor` down to `descendant`, oldest first.
fn actions_between(
    graph: &Graph,
    ancestor: NodeId,
    descendant: NodeId,
) -> Result<Vec<NodeId>, GraphError> {
    let mut actions = Vec::new();
    let mut cursor = descendant;
    while cursor != ancestor {
        let state = graph.expect_state(cursor)?;
        match (state.resulting_from, state.previous) {
            (Some(action), Some(previous)) => {
                actions.push(action);
                cursor = previous;
            }
            _ => {
                return Err(GraphError::Malformed {
                    message: format!("state {ancestor} is not an ancestor of {descendant}"),
                })
            }
        }
    }
    actions.reverse();
    Ok(actions)
}

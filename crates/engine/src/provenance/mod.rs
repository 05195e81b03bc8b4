//! The stateful provenance graph: owns the arena, the current-state pointer
//! and the slide selection, and serializes every mutation.

mod execute;
mod slides;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use provenant_compress::CompressionPipeline;
use provenant_graph::{
    ActionNode, Graph, GraphDesc, NodeId, ObjectRef, SerializedGraph,
};

use crate::config::EngineConfig;
use crate::error::ProvenanceError;
use crate::events::{GraphEvent, Observers, SubscriptionId};
use crate::registry::CommandRegistry;

/// Descriptor attribute recording the current state at persist time.
pub const CURRENT_STATE_ATTR: &str = "current_state";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Coarse lifecycle of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No action has been executed.
    Empty,
    /// A mutation is in flight.
    Building,
    Idle,
}

struct Inner {
    desc: GraphDesc,
    graph: Graph,
    current: NodeId,
    selected: Vec<NodeId>,
    /// Set once the current state has been moved since construction.
    moved: bool,
}

impl Inner {
    fn move_to(&mut self, state: NodeId) {
        self.current = state;
        self.moved = true;
    }
}

/// A provenance graph bound to a command registry.
///
/// `push`, `run_chain`, `undo` and `jump_to` are queued on a fair lock and
/// applied one at a time in call order. Reads never wait for a pending
/// mutation; they observe the last committed state.
///
/// Listeners registered with [`subscribe`](Self::subscribe) run synchronously
/// after each committed change.
pub struct ProvenanceGraph {
    instance: u64,
    registry: CommandRegistry,
    config: EngineConfig,
    pipeline: CompressionPipeline,
    inner: RwLock<Inner>,
    ops: tokio::sync::Mutex<()>,
    busy: AtomicBool,
    observers: Observers,
    persisted_current: Option<NodeId>,
}

impl ProvenanceGraph {
    /// An empty graph holding only its root state.
    pub fn new(desc: GraphDesc, registry: CommandRegistry, config: EngineConfig) -> Self {
        Self::from_parts(desc, Graph::new(), registry, config, None)
    }

    /// Rebuild a graph from its persisted form.
    ///
    /// Every command id referenced by the graph must be registered. The
    /// restored graph starts at the root with detached object handles;
    /// jumping to a state replays the actions that lead there.
    pub fn restore(
        serialized: &SerializedGraph,
        registry: CommandRegistry,
        config: EngineConfig,
    ) -> Result<Self, ProvenanceError> {
        registry.check_all(serialized.function_ids())?;
        let graph = Graph::from_serialized(serialized)?;
        let persisted_current = serialized
            .desc
            .attrs
            .get(CURRENT_STATE_ATTR)
            .and_then(|v| v.as_u64())
            .map(NodeId)
            .filter(|id| graph.state(*id).is_some());
        let mut desc = serialized.desc.clone();
        desc.attrs.remove(CURRENT_STATE_ATTR);
        tracing::debug!(
            graph = %desc.id,
            nodes = serialized.nodes.len(),
            edges = serialized.edges.len(),
            "graph restored"
        );
        Ok(Self::from_parts(desc, graph, registry, config, persisted_current))
    }

    fn from_parts(
        desc: GraphDesc,
        graph: Graph,
        registry: CommandRegistry,
        config: EngineConfig,
        persisted_current: Option<NodeId>,
    ) -> Self {
        let pipeline = config.pipeline();
        let current = graph.root();
        ProvenanceGraph {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            registry,
            config,
            pipeline,
            inner: RwLock::new(Inner {
                desc,
                graph,
                current,
                selected: Vec::new(),
                moved: false,
            }),
            ops: tokio::sync::Mutex::new(()),
            busy: AtomicBool::new(false),
            observers: Observers::new(),
            persisted_current,
        }
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: GraphEvent) {
        self.observers.emit(&event);
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn desc(&self) -> GraphDesc {
        self.read_inner().desc.clone()
    }

    pub fn id(&self) -> String {
        self.read_inner().desc.id.clone()
    }

    pub(crate) fn set_desc(&self, desc: GraphDesc) {
        self.write_inner().desc = desc;
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        if self.busy.load(Ordering::SeqCst) {
            Phase::Building
        } else if self.is_empty() {
            Phase::Empty
        } else {
            Phase::Idle
        }
    }

    /// `true` iff no action has been recorded.
    pub fn is_empty(&self) -> bool {
        self.read_inner().graph.is_empty()
    }

    pub fn current_state(&self) -> NodeId {
        self.read_inner().current
    }

    /// The state that was current when this graph was persisted, if it was
    /// restored from storage.
    pub fn persisted_current(&self) -> Option<NodeId> {
        self.persisted_current
    }

    /// The state recorded as current on persist: the live current state, or
    /// the restored one while nothing has moved it.
    fn recorded_current(&self, inner: &Inner) -> NodeId {
        match self.persisted_current {
            Some(state) if !inner.moved => state,
            _ => inner.current,
        }
    }

    /// Run `f` against a read-only view of the graph.
    pub fn read<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.read_inner().graph)
    }

    // ── Annotations ──────────────────────────────────────────────────────────

    pub fn set_state_attr(
        &self,
        state: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), ProvenanceError> {
        Ok(self.write_inner().graph.set_state_attr(state, key, value)?)
    }

    pub fn set_action_attr(
        &self,
        action: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), ProvenanceError> {
        Ok(self.write_inner().graph.set_action_attr(action, key, value)?)
    }

    /// Bind a live handle to every detached object node with the same hash,
    /// typically data that existed before the recorded session started.
    /// Returns the number of nodes bound.
    pub fn bind_object(&self, object: ObjectRef) -> usize {
        let mut inner = self.write_inner();
        let targets: Vec<NodeId> = inner
            .graph
            .objects()
            .filter(|o| o.hash() == object.hash() && o.object.is_detached())
            .map(|o| o.id)
            .collect();
        for id in &targets {
            if let Err(err) = inner.graph.bind_object(*id, object.clone()) {
                tracing::warn!(object = %id, error = %err, "binding object failed");
            }
        }
        targets.len()
    }

    // ── Paths ────────────────────────────────────────────────────────────────

    /// Actions leading from the root to `state`, in execution order.
    pub fn replay_path(&self, state: NodeId) -> Result<Vec<ActionNode>, ProvenanceError> {
        let inner = self.read_inner();
        if inner.graph.state(state).is_none() {
            return Err(ProvenanceError::UnreachableState { state });
        }
        collect_actions(&inner.graph, &inner.graph.action_path(state)?)
    }

    /// The path to the current state after the configured compression.
    pub fn compressed_path(&self) -> Result<Vec<ActionNode>, ProvenanceError> {
        let path = self.replay_path(self.current_state())?;
        Ok(self.pipeline.apply(&path))
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Export the full graph. The current state is recorded in the
    /// descriptor attributes under [`CURRENT_STATE_ATTR`]. A restored graph
    /// that has not moved yet keeps the state it was persisted at.
    pub fn persist(&self) -> SerializedGraph {
        let inner = self.read_inner();
        let current = self.recorded_current(&inner);
        let mut desc = inner.desc.clone();
        desc.attrs
            .insert(CURRENT_STATE_ATTR.to_string(), serde_json::json!(current.0));
        inner.graph.to_serialized(desc)
    }

    /// Export only the compressed path to the recorded current state (see
    /// [`persist`](Self::persist)), as a linear
    /// graph. Branches, undo links and slides are dropped. If the compressed
    /// path does not form a valid graph the uncompressed path is used.
    pub fn persist_compacted(&self) -> Result<SerializedGraph, ProvenanceError> {
        let inner = self.read_inner();
        let full = inner.graph.action_path(self.recorded_current(&inner))?;
        let actions = collect_actions(&inner.graph, &full)?;
        let kept: Vec<NodeId> = self.pipeline.apply(&actions).iter().map(|a| a.id).collect();
        let linear = match inner.graph.linearize(&kept) {
            Ok(linear) => linear,
            Err(err) => {
                tracing::warn!(
                    graph = %inner.desc.id,
                    error = %err,
                    "compressed path is not replayable, persisting it uncompressed"
                );
                inner.graph.linearize(&full)?
            }
        };
        let last = linear
            .actions()
            .last()
            .map(|a| a.resulted_in)
            .unwrap_or_else(|| linear.root());
        let mut desc = inner.desc.clone();
        desc.attrs
            .insert(CURRENT_STATE_ATTR.to_string(), serde_json::json!(last.0));
        tracing::debug!(
            graph = %desc.id,
            before = full.len(),
            after = linear.actions().count(),
            "graph compacted"
        );
        Ok(linear.to_serialized(desc))
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl std::fmt::Debug for ProvenanceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read_inner();
        f.debug_struct("ProvenanceGraph")
            .field("id", &inner.desc.id)
            .field("nodes", &inner.graph.len())
            .field("current", &inner.current)
            .finish()
    }
}

fn collect_actions(graph: &Graph, ids: &[NodeId]) -> Result<Vec<ActionNode>, ProvenanceError> {
    ids.iter()
        .map(|id| Ok(graph.expect_action(*id)?.clone()))
        .collect()
}

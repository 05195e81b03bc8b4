//! A tiny view-editing domain used to drive the engine in tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use provenant_engine::{
    command_fn, CommandError, CommandOutcome, CommandRegistry, CommandRegistryBuilder,
    EngineConfig, GraphEvent, ProvenanceGraph,
};
use provenant_graph::{
    ActionCategory, ActionDescriptor, ActionMetaData, ActionOperation, GraphDesc, NodeId,
    ObjectCategory, ObjectRef,
};

/// Shared, observable side effects of the test commands.
#[derive(Default)]
pub struct Board {
    pub views: Mutex<BTreeSet<String>>,
    pub log: Mutex<Vec<String>>,
}

impl Board {
    pub fn views(&self) -> Vec<String> {
        self.views.lock().unwrap().iter().cloned().collect()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct View {
    pub zoom: Mutex<i64>,
}

pub fn meta(name: &str, operation: ActionOperation) -> ActionMetaData {
    ActionMetaData::new(name, ActionCategory::Visual, operation)
}

pub fn add_view(name: &str) -> ActionDescriptor {
    ActionDescriptor::new("addView", meta(&format!("Add {name}"), ActionOperation::Create))
        .with_parameter("name", serde_json::json!(name))
}

pub fn remove_view(view: &ObjectRef) -> ActionDescriptor {
    ActionDescriptor::new(
        "removeView",
        meta(&format!("Remove {}", view.name()), ActionOperation::Remove),
    )
    .with_input(view.clone())
}

pub fn set_zoom(view: &ObjectRef, value: i64) -> ActionDescriptor {
    ActionDescriptor::new("setZoom", meta(&format!("Zoom {value}"), ActionOperation::Update))
        .with_parameter("value", serde_json::json!(value))
        .with_input(view.clone())
}

pub fn append(tag: &str, delay_ms: u64) -> ActionDescriptor {
    ActionDescriptor::new("append", meta(&format!("Append {tag}"), ActionOperation::Update))
        .with_parameter("tag", serde_json::json!(tag))
        .with_parameter("delay_ms", serde_json::json!(delay_ms))
}

pub fn fail() -> ActionDescriptor {
    ActionDescriptor::new("fail", meta("Fail", ActionOperation::Update))
}

pub fn flaky() -> ActionDescriptor {
    ActionDescriptor::new("flaky", meta("Flaky", ActionOperation::Update))
}

fn first_input(inputs: &[ObjectRef]) -> Result<ObjectRef, CommandError> {
    inputs
        .first()
        .cloned()
        .ok_or_else(|| CommandError::new("missing input"))
}

pub fn builder(board: Arc<Board>) -> CommandRegistryBuilder {
    let mut builder = CommandRegistryBuilder::new();

    builder
        .register("addView", {
            let board = board.clone();
            command_fn(move |_, params, _| {
                let board = board.clone();
                async move {
                    let name = params
                        .get("name")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| CommandError::new("missing name"))?
                        .to_string();
                    let view = ObjectRef::new(
                        name.clone(),
                        ObjectCategory::Visual,
                        format!("view:{name}"),
                        View::default(),
                    );
                    board.views.lock().unwrap().insert(name);
                    Ok(CommandOutcome::new(remove_view(&view)).created(view))
                }
            })
        })
        .unwrap();

    builder
        .register("removeView", {
            let board = board.clone();
            command_fn(move |inputs, _, _| {
                let board = board.clone();
                async move {
                    let view = first_input(&inputs)?;
                    board.views.lock().unwrap().remove(view.name());
                    Ok(CommandOutcome::new(add_view(view.name())).removed(view))
                }
            })
        })
        .unwrap();

    builder
        .register(
            "setZoom",
            command_fn(|inputs, params, _| async move {
                let view = first_input(&inputs)?;
                let state = view.resolve_as::<View>().await?;
                let value = params
                    .get("value")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| CommandError::new("missing value"))?;
                let old = std::mem::replace(&mut *state.zoom.lock().unwrap(), value);
                Ok(CommandOutcome::new(set_zoom(&view, old)))
            }),
        )
        .unwrap();

    builder
        .register("append", {
            let board = board.clone();
            command_fn(move |_, params, _| {
                let board = board.clone();
                async move {
                    let tag = params
                        .get("tag")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let delay = params.get("delay_ms").and_then(|v| v.as_u64()).unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    board.log.lock().unwrap().push(tag.clone());
                    Ok(CommandOutcome::new(ActionDescriptor::new(
                        "pop",
                        meta(&format!("Pop {tag}"), ActionOperation::Remove),
                    )))
                }
            })
        })
        .unwrap();

    builder
        .register("pop", {
            let board = board.clone();
            command_fn(move |_, _, _| {
                let board = board.clone();
                async move {
                    let tag = board
                        .log
                        .lock()
                        .unwrap()
                        .pop()
                        .ok_or_else(|| CommandError::new("log is empty"))?;
                    Ok(CommandOutcome::new(append(&tag, 0)))
                }
            })
        })
        .unwrap();

    builder
        .register(
            "fail",
            command_fn(|_, _, _| async { Err(CommandError::new("boom")) }),
        )
        .unwrap();

    // Succeeds when recorded, fails whenever it is replayed.
    builder
        .register(
            "flaky",
            command_fn(|_, _, ctx| async move {
                if ctx.replaying {
                    Err(CommandError::new("cannot replay"))
                } else {
                    Ok(CommandOutcome::new(flaky()))
                }
            }),
        )
        .unwrap();

    builder
}

pub fn registry(board: Arc<Board>) -> CommandRegistry {
    init_tracing();
    builder(board).build()
}

/// Route engine traces to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn new_graph(board: Arc<Board>, config: EngineConfig) -> ProvenanceGraph {
    init_tracing();
    ProvenanceGraph::new(GraphDesc::new("g-test", "test", "tester"), registry(board), config)
}

/// Object handle currently bound to an object node.
pub fn handle(graph: &ProvenanceGraph, object: NodeId) -> ObjectRef {
    graph.read(|g| g.object(object).unwrap().object.clone())
}

pub async fn zoom_of(view: &ObjectRef) -> i64 {
    *view.resolve_as::<View>().await.unwrap().zoom.lock().unwrap()
}

/// Record every event emitted by `graph`.
pub fn record_events(graph: &ProvenanceGraph) -> Arc<Mutex<Vec<GraphEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    graph.subscribe(move |e: &GraphEvent| sink.lock().unwrap().push(e.clone()));
    events
}

//! Compression over action nodes recorded in a real graph.

use provenant_compress::{
    create_remove, last_consecutive, last_only, CompressionPipeline, CompressionRule, Compressor,
};
use provenant_graph::{
    ActionCategory, ActionMetaData, ActionNode, ActionOperation, Graph, NewAction, NodeId,
    ObjectCategory, ObjectRef,
};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

struct Recorder {
    graph: Graph,
    current: NodeId,
    path: Vec<NodeId>,
}

impl Recorder {
    fn new() -> Self {
        let graph = Graph::new();
        let current = graph.root();
        Recorder {
            graph,
            current,
            path: Vec::new(),
        }
    }

    fn object(&mut self, hash: &str) -> NodeId {
        self.graph
            .add_object(ObjectRef::detached(hash, ObjectCategory::Visual, hash))
    }

    fn record(&mut self, f_id: &str, parameter: serde_json::Value, shape: Shape) -> NodeId {
        let (action, state) = self
            .graph
            .add_action(
                self.current,
                NewAction {
                    f_id: f_id.to_string(),
                    meta: ActionMetaData::at(f_id, ActionCategory::Selection, ActionOperation::Update, 0),
                    parameter: parameter.as_object().cloned().unwrap_or_default(),
                    requires: shape.requires,
                    creates: shape.creates,
                    removes: shape.removes,
                    inverse: None,
                    inverses: None,
                },
                f_id,
            )
            .unwrap();
        self.current = state;
        self.path.push(action);
        action
    }

    fn actions(&self) -> Vec<ActionNode> {
        self.path
            .iter()
            .map(|id| self.graph.action(*id).unwrap().clone())
            .collect()
    }
}

#[derive(Default)]
struct Shape {
    requires: Vec<NodeId>,
    creates: Vec<NodeId>,
    removes: Vec<NodeId>,
}

fn ids(path: &[ActionNode]) -> Vec<NodeId> {
    path.iter().map(|a| a.id).collect()
}

fn selection_key(a: &ActionNode) -> String {
    a.parameter
        .get("selection")
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// Six selection actions: `selection1`, two adjacent `selection2`, two
/// adjacent `selection3`, then a non-adjacent `selection2`.
fn selection_fixture() -> (Recorder, Vec<NodeId>) {
    let mut r = Recorder::new();
    let steps = [
        ("selection1", "sel1"),
        ("selection2", "sel2"),
        ("selection2", "sel2"),
        ("selection3", "sel3"),
        ("selection3", "sel3"),
        ("selection2", "sel2"),
    ];
    let mut ids = Vec::new();
    for (f_id, key) in steps {
        ids.push(r.record(
            f_id,
            serde_json::json!({ "selection": key }),
            Shape::default(),
        ));
    }
    (r, ids)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn selection_fixture_last_only() {
    let (r, a) = selection_fixture();
    let path = r.actions();
    let out = last_only(&path, "selection2", selection_key);
    assert_eq!(ids(&out), vec![a[0], a[3], a[4], a[5]]);
}

#[test]
fn selection_fixture_last_consecutive() {
    let (r, a) = selection_fixture();
    let path = r.actions();
    let out = last_consecutive(&path, "selection2", selection_key);
    assert_eq!(ids(&out), vec![a[0], a[2], a[3], a[4], a[5]]);
}

#[test]
fn compression_does_not_touch_input() {
    let (r, _) = selection_fixture();
    let path = r.actions();
    let before = path.clone();
    let _ = last_only(&path, "selection2", selection_key);
    let _ = last_consecutive(&path, "selection3", selection_key);
    assert_eq!(path, before);
}

#[test]
fn works_on_borrowed_actions() {
    let (r, a) = selection_fixture();
    let owned = r.actions();
    let borrowed: Vec<&ActionNode> = owned.iter().collect();
    let out = last_only(&borrowed, "selection3", |n: &&ActionNode| selection_key(n));
    assert_eq!(
        out.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![a[0], a[1], a[2], a[4], a[5]]
    );
}

#[test]
fn create_remove_over_graph_actions() {
    let mut r = Recorder::new();
    let x = r.object("view-x");
    let y = r.object("view-y");
    r.record("addView", serde_json::json!({}), Shape { creates: vec![x], ..Shape::default() });
    let keep_y = r.record("addView", serde_json::json!({}), Shape { creates: vec![y], ..Shape::default() });
    r.record("setParameter", serde_json::json!({"name": "zoom"}), Shape { requires: vec![x], ..Shape::default() });
    r.record("removeView", serde_json::json!({}), Shape { requires: vec![x], removes: vec![x], ..Shape::default() });

    let out = create_remove(&r.actions(), "addView", "removeView");
    assert_eq!(ids(&out), vec![keep_y]);
}

#[test]
fn pipeline_from_toml_config() {
    #[derive(serde::Deserialize)]
    struct Config {
        compression: Vec<CompressionRule>,
    }
    let config: Config = toml::from_str(
        r#"
        [[compression]]
        kind = "last_only"
        function_id = "setParameter"
        key = "/name"

        [[compression]]
        kind = "create_remove"
        create = "addView"
        remove = "removeView"
        "#,
    )
    .unwrap();

    let mut r = Recorder::new();
    let x = r.object("x");
    let y = r.object("y");
    let add_y = r.record("addView", serde_json::json!({}), Shape { creates: vec![y], ..Shape::default() });
    r.record("setParameter", serde_json::json!({"name": "zoom", "value": 1}), Shape { requires: vec![y], ..Shape::default() });
    let last_zoom = r.record("setParameter", serde_json::json!({"name": "zoom", "value": 2}), Shape { requires: vec![y], ..Shape::default() });
    r.record("addView", serde_json::json!({}), Shape { creates: vec![x], ..Shape::default() });
    r.record("setParameter", serde_json::json!({"name": "zoom", "value": 3}), Shape { requires: vec![x], ..Shape::default() });
    r.record("removeView", serde_json::json!({}), Shape { requires: vec![x], removes: vec![x], ..Shape::default() });

    let pipeline = CompressionPipeline::from_rules(&config.compression);
    let out = pipeline.apply(&r.actions());
    assert_eq!(ids(&out), vec![add_y, last_zoom]);
}

struct Broken;

impl Compressor for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn compress(&self, path: &[ActionNode]) -> Vec<ActionNode> {
        last_only(path, "selection2", |_: &ActionNode| -> String {
            panic!("key function failed")
        })
    }
}

#[test]
fn broken_step_is_isolated_in_pipeline() {
    let (r, a) = selection_fixture();
    let mut pipeline = CompressionPipeline::new();
    pipeline.push(Box::new(Broken));
    pipeline.push(Box::new(provenant_compress::RuleCompressor::new(
        CompressionRule::LastConsecutive {
            function_id: "selection3".to_string(),
            key: Some("/selection".to_string()),
            per_object: true,
        },
    )));
    let out = pipeline.apply(&r.actions());
    assert_eq!(ids(&out), vec![a[0], a[1], a[2], a[4], a[5]]);
}

#[test]
fn key_function_panics_propagate_from_plain_functions() {
    let (r, _) = selection_fixture();
    let path = r.actions();
    let result = std::panic::catch_unwind(|| {
        last_only(&path, "selection2", |_: &ActionNode| -> String { panic!("boom") })
    });
    assert!(result.is_err());
}

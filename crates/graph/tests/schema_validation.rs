//! Validates persisted graphs against the wire-format schema at
//! schema/provenance-graph.schema.json.

use std::path::Path;

use provenant_graph::{
    ActionCategory, ActionMetaData, ActionOperation, Graph, GraphDesc, InverseAction, NewAction,
    NewSlide, ObjectCategory, ObjectRef, Parameters, SlidePosition,
};

fn validator() -> jsonschema::Validator {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/provenance-graph.schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn meta(name: &str, operation: ActionOperation) -> ActionMetaData {
    ActionMetaData::at(name, ActionCategory::Visual, operation, 1_700_000_000_000)
}

fn story_graph() -> Graph {
    let mut g = Graph::new();
    let view = g.add_object(ObjectRef::detached("Scatterplot", ObjectCategory::Visual, "view-1"));
    let (_, created) = g
        .add_action(
            g.root(),
            NewAction {
                f_id: "addView".to_string(),
                meta: meta("Add Scatterplot", ActionOperation::Create),
                parameter: Parameters::new(),
                requires: vec![],
                creates: vec![view],
                removes: vec![],
                inverse: Some(InverseAction {
                    f_id: "removeView".to_string(),
                    meta: meta("Remove Scatterplot", ActionOperation::Remove),
                    parameter: Parameters::new(),
                    inputs: vec![view],
                }),
                inverses: None,
            },
            "Scatterplot added",
        )
        .unwrap();
    let mut parameter = Parameters::new();
    parameter.insert("name".to_string(), serde_json::json!("opacity"));
    parameter.insert("value".to_string(), serde_json::json!(0.5));
    let (_, tuned) = g
        .add_action(
            created,
            NewAction {
                f_id: "setParameter".to_string(),
                meta: meta("Set opacity", ActionOperation::Update),
                parameter,
                requires: vec![view],
                creates: vec![],
                removes: vec![],
                inverse: None,
                inverses: None,
            },
            "Opacity 0.5",
        )
        .unwrap();
    g.set_state_attr(tuned, "thumbnail", serde_json::json!("thumb/3.png"))
        .unwrap();
    let head = g
        .add_slide(NewSlide::text("Intro", "Our findings"), SlidePosition::Head)
        .unwrap();
    g.add_slide(
        NewSlide::for_state("Tuned", tuned).with_duration(3000),
        SlidePosition::After(head),
    )
    .unwrap();
    g
}

#[test]
fn persisted_graphs_match_schema() {
    let validator = validator();
    let mut failures = Vec::new();
    let samples = [
        ("empty", Graph::new()),
        ("story", story_graph()),
    ];
    for (label, graph) in samples {
        let mut desc = GraphDesc::new(format!("graph-{label}"), label, "tester");
        desc.touch();
        let instance = serde_json::to_value(graph.to_serialized(desc)).unwrap();
        if let Err(error) = validator.validate(&instance) {
            failures.push(format!("{}: {}", label, error));
        }
    }
    assert!(
        failures.is_empty(),
        "Schema validation failed:\n{}",
        failures.join("\n")
    );
}

#[test]
fn schema_rejects_unknown_edge_type() {
    let validator = validator();
    let mut instance =
        serde_json::to_value(story_graph().to_serialized(GraphDesc::new("g", "g", "t"))).unwrap();
    instance["edges"][0]["type"] = serde_json::json!("parentOf");
    assert!(validator.validate(&instance).is_err());
}

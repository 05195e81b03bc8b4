use std::future::Future;

use provenant_graph::{Graph, NodeKind, SerializedEdge};

use super::{story_graph, Check};
use crate::GraphStore;

pub(super) async fn run_roundtrip_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        Check::new(
            "roundtrip",
            "stored_graph_rebuilds",
            stored_graph_rebuilds(factory).await,
        ),
        Check::new(
            "roundtrip",
            "parameter_values_preserved",
            parameter_values_preserved(factory).await,
        ),
    ]
}

/// A stored document must rebuild into the same topology it was taken from.
async fn stored_graph_rebuilds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let original = story_graph("g-1")?;
    store
        .insert(original.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let loaded = store.get("g-1").await.map_err(|e| format!("get: {e}"))?;
    let graph = Graph::from_serialized(&loaded).map_err(|e| format!("rebuild: {e}"))?;

    for kind in [NodeKind::Action, NodeKind::Object, NodeKind::State, NodeKind::Slide] {
        if loaded.count(kind) != original.count(kind) {
            return Err(format!(
                "{kind:?} count changed: {} -> {}",
                original.count(kind),
                loaded.count(kind)
            ));
        }
    }
    let mut expected = original.edges.clone();
    let mut actual = graph.to_serialized(loaded.desc.clone()).edges;
    let key = |e: &SerializedEdge| (e.from, e.to, e.index, format!("{:?}", e.kind));
    expected.sort_by_key(key);
    actual.sort_by_key(key);
    if expected != actual {
        return Err("edges differ after rebuild".to_string());
    }
    Ok(())
}

async fn parameter_values_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(story_graph("g-1")?)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let loaded = store.get("g-1").await.map_err(|e| format!("get: {e}"))?;
    let graph = Graph::from_serialized(&loaded).map_err(|e| format!("rebuild: {e}"))?;
    let zoom = graph
        .actions()
        .find(|a| a.f_id == "setParameter")
        .ok_or("setParameter action missing")?;
    if zoom.parameter.get("value") != Some(&serde_json::json!(2.5)) {
        return Err(format!("parameter changed: {:?}", zoom.parameter));
    }
    let add = graph
        .actions()
        .find(|a| a.f_id == "addView")
        .ok_or("addView action missing")?;
    match &add.inverse {
        Some(inverse) if inverse.f_id == "removeView" && inverse.inputs == add.creates => {}
        other => return Err(format!("inverse not preserved: {other:?}")),
    }
    if !graph
        .states()
        .any(|s| s.attrs.get("thumbnail").is_some())
    {
        return Err("state attrs lost".to_string());
    }
    Ok(())
}

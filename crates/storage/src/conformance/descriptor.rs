use std::future::Future;

use super::{story_graph, Check};
use crate::{DescPatch, GraphStore, StorageError};

pub(super) async fn run_descriptor_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        Check::new(
            "descriptor",
            "patch_updates_name_and_description",
            patch_updates_name_and_description(factory).await,
        ),
        Check::new(
            "descriptor",
            "patch_merges_attrs",
            patch_merges_attrs(factory).await,
        ),
        Check::new(
            "descriptor",
            "patch_keeps_nodes_and_edges",
            patch_keeps_nodes_and_edges(factory).await,
        ),
        Check::new(
            "descriptor",
            "patch_visible_in_list",
            patch_visible_in_list(factory).await,
        ),
        Check::new(
            "descriptor",
            "patch_unknown_not_found",
            patch_unknown_not_found(factory).await,
        ),
    ]
}

async fn patch_updates_name_and_description<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let desc = store
        .update_desc("g-1", DescPatch::new().name("renamed").description("new text"))
        .await
        .map_err(|e| format!("update_desc: {e}"))?;
    if desc.name != "renamed" || desc.description != "new text" {
        return Err(format!("patch not applied: {desc:?}"));
    }
    if desc.creator != "conformance" {
        return Err(format!("creator changed to {:?}", desc.creator));
    }
    if desc.modified.is_none() {
        return Err("update_desc did not stamp `modified`".to_string());
    }
    Ok(())
}

async fn patch_merges_attrs<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let desc = store
        .update_desc(
            "g-1",
            DescPatch::new().attr("shared", serde_json::json!(true)),
        )
        .await
        .map_err(|e| format!("update_desc: {e}"))?;
    if desc.attrs.get("tags") != Some(&serde_json::json!(["demo"])) {
        return Err(format!("existing attr lost: {:?}", desc.attrs));
    }
    if desc.attrs.get("shared") != Some(&serde_json::json!(true)) {
        return Err(format!("new attr missing: {:?}", desc.attrs));
    }
    let desc = store
        .update_desc("g-1", DescPatch::new().attr("tags", serde_json::Value::Null))
        .await
        .map_err(|e| format!("update_desc remove: {e}"))?;
    if desc.attrs.contains_key("tags") {
        return Err("null attr did not remove the key".to_string());
    }
    Ok(())
}

async fn patch_keeps_nodes_and_edges<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let graph = story_graph("g-1")?;
    store
        .insert(graph.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    store
        .update_desc("g-1", DescPatch::new().name("renamed"))
        .await
        .map_err(|e| format!("update_desc: {e}"))?;
    let loaded = store.get("g-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.nodes != graph.nodes || loaded.edges != graph.edges {
        return Err("descriptor patch altered the graph body".to_string());
    }
    Ok(())
}

async fn patch_visible_in_list<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let patched = store
        .update_desc("g-1", DescPatch::new().name("listed"))
        .await
        .map_err(|e| format!("update_desc: {e}"))?;
    let listed = store.list().await.map_err(|e| format!("list: {e}"))?;
    if listed != vec![patched] {
        return Err(format!("list does not reflect patch: {listed:?}"));
    }
    Ok(())
}

async fn patch_unknown_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.update_desc("missing", DescPatch::new().name("x")).await {
        Err(StorageError::NotFound { id }) if id == "missing" => Ok(()),
        other => Err(format!("expected NotFound(missing), got {other:?}")),
    }
}

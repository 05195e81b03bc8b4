use std::future::Future;

use super::{empty_graph, story_graph, Check};
use crate::{GraphStore, StorageError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        Check::new(
            "crud",
            "list_empty_store",
            list_empty_store(factory).await,
        ),
        Check::new(
            "crud",
            "insert_then_get_returns_document",
            insert_then_get_returns_document(factory).await,
        ),
        Check::new(
            "crud",
            "list_returns_descriptors_ordered_by_id",
            list_returns_descriptors_ordered_by_id(factory).await,
        ),
        Check::new(
            "crud",
            "insert_duplicate_already_exists",
            insert_duplicate_already_exists(factory).await,
        ),
        Check::new(
            "crud",
            "get_unknown_not_found",
            get_unknown_not_found(factory).await,
        ),
        Check::new(
            "crud",
            "update_replaces_document",
            update_replaces_document(factory).await,
        ),
        Check::new(
            "crud",
            "update_unknown_not_found",
            update_unknown_not_found(factory).await,
        ),
    ]
}

async fn list_empty_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let listed = store.list().await.map_err(|e| format!("list: {e}"))?;
    if !listed.is_empty() {
        return Err(format!("expected empty list, got {} entries", listed.len()));
    }
    Ok(())
}

async fn insert_then_get_returns_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let graph = story_graph("g-1")?;
    let desc = store
        .insert(graph.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;
    if desc != graph.desc {
        return Err(format!("insert returned {desc:?}, expected {:?}", graph.desc));
    }
    let loaded = store.get("g-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded != graph {
        return Err("stored document differs from inserted one".to_string());
    }
    Ok(())
}

async fn list_returns_descriptors_ordered_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["g-b", "g-c", "g-a"] {
        store
            .insert(empty_graph(id))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let ids: Vec<String> = store
        .list()
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if ids != ["g-a", "g-b", "g-c"] {
        return Err(format!("expected [g-a, g-b, g-c], got {ids:?}"));
    }
    Ok(())
}

async fn insert_duplicate_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(empty_graph("dup"))
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    let mut second = empty_graph("dup");
    second.desc.name = "replacement".to_string();
    match store.insert(second).await {
        Err(StorageError::AlreadyExists { id }) if id == "dup" => {}
        other => return Err(format!("expected AlreadyExists(dup), got {other:?}")),
    }
    let kept = store.get("dup").await.map_err(|e| format!("get: {e}"))?;
    if kept.desc.name != "graph dup" {
        return Err(format!("original document overwritten: {:?}", kept.desc.name));
    }
    Ok(())
}

async fn get_unknown_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get("missing").await {
        Err(StorageError::NotFound { id }) if id == "missing" => Ok(()),
        other => Err(format!("expected NotFound(missing), got {other:?}")),
    }
}

async fn update_replaces_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .insert(empty_graph("g-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let replacement = story_graph("g-1")?;
    let desc = store
        .update(replacement.clone())
        .await
        .map_err(|e| format!("update: {e}"))?;
    if desc.modified.is_none() {
        return Err("update did not stamp `modified`".to_string());
    }
    let loaded = store.get("g-1").await.map_err(|e| format!("get: {e}"))?;
    if loaded.nodes != replacement.nodes || loaded.edges != replacement.edges {
        return Err("update did not replace nodes and edges".to_string());
    }
    if loaded.desc != desc {
        return Err(format!("stored desc {:?} differs from returned {desc:?}", loaded.desc));
    }
    Ok(())
}

async fn update_unknown_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.update(empty_graph("ghost")).await {
        Err(StorageError::NotFound { id }) if id == "ghost" => {}
        other => return Err(format!("expected NotFound(ghost), got {other:?}")),
    }
    if !store.list().await.map_err(|e| format!("list: {e}"))?.is_empty() {
        return Err("update of unknown id created a document".to_string());
    }
    Ok(())
}

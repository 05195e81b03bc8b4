use std::future::Future;

use super::{empty_graph, Check};
use crate::{GraphStore, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        Check::new(
            "delete",
            "delete_existing_returns_true",
            delete_existing_returns_true(factory).await,
        ),
        Check::new(
            "delete",
            "delete_twice_returns_false",
            delete_twice_returns_false(factory).await,
        ),
        Check::new(
            "delete",
            "delete_leaves_other_graphs",
            delete_leaves_other_graphs(factory).await,
        ),
        Check::new(
            "delete",
            "id_reusable_after_delete",
            id_reusable_after_delete(factory).await,
        ),
    ]
}

async fn delete_existing_returns_true<S, F, Fut>(factory: &F) -> Result<(), String>
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
    if !store.delete("g-1").await.map_err(|e| format!("delete: {e}"))? {
        return Err("delete of stored graph returned false".to_string());
    }
    match store.get("g-1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound after delete, got {other:?}")),
    }
}

async fn delete_twice_returns_false<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .delete("g-1")
        .await
        .map_err(|e| format!("first delete: {e}"))?;
    if store
        .delete("g-1")
        .await
        .map_err(|e| format!("second delete: {e}"))?
    {
        return Err("second delete returned true".to_string());
    }
    if store
        .delete("never-stored")
        .await
        .map_err(|e| format!("delete unknown: {e}"))?
    {
        return Err("delete of unknown id returned true".to_string());
    }
    Ok(())
}

async fn delete_leaves_other_graphs<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["g-1", "g-2"] {
        store
            .insert(empty_graph(id))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    store
        .delete("g-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    let ids: Vec<String> = store
        .list()
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|d| d.id)
        .collect();
    if ids != ["g-2"] {
        return Err(format!("expected [g-2], got {ids:?}"));
    }
    Ok(())
}

async fn id_reusable_after_delete<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .delete("g-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    store
        .insert(empty_graph("g-1"))
        .await
        .map_err(|e| format!("re-insert: {e}"))?;
    Ok(())
}

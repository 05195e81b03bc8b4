use std::future::Future;
use std::sync::Arc;

use super::{empty_graph, Check};
use crate::{DescPatch, GraphStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        Check::new(
            "concurrent",
            "concurrent_inserts_same_id_exactly_one_wins",
            concurrent_inserts_same_id_exactly_one_wins(factory).await,
        ),
        Check::new(
            "concurrent",
            "concurrent_inserts_distinct_ids_all_succeed",
            concurrent_inserts_distinct_ids_all_succeed(factory).await,
        ),
        Check::new(
            "concurrent",
            "concurrent_patches_all_applied",
            concurrent_patches_all_applied(factory).await,
        ),
    ]
}

async fn concurrent_inserts_same_id_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let mut handles = Vec::new();
    for _ in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.insert(empty_graph("contested")).await {
                Ok(_) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }
    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly one winner, got {winners}"));
    }
    Ok(())
}

async fn concurrent_inserts_distinct_ids_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.insert(empty_graph(&format!("g-{i:02}"))).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("insert: {e}"))?;
    }
    let listed = store.list().await.map_err(|e| format!("list: {e}"))?;
    if listed.len() != N {
        return Err(format!("expected {N} graphs, got {}", listed.len()));
    }
    Ok(())
}

/// Descriptor patches touching different keys must not lose each other's
/// writes.
async fn concurrent_patches_all_applied<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .insert(empty_graph("shared"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.update_desc(
                "shared",
                DescPatch::new().attr(format!("k{i}"), serde_json::json!(i)),
            )
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("update_desc: {e}"))?;
    }
    let desc = store
        .get("shared")
        .await
        .map_err(|e| format!("get: {e}"))?
        .desc;
    let missing: Vec<usize> = (0..N)
        .filter(|i| !desc.attrs.contains_key(&format!("k{i}")))
        .collect();
    if !missing.is_empty() {
        return Err(format!("lost patches for keys {missing:?}"));
    }
    Ok(())
}

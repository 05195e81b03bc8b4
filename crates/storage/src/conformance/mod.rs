//! Conformance test suite for `GraphStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `GraphStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **CRUD**: insert, get, list and update of whole graph documents
//! - **Descriptor**: partial descriptor updates leave the graph untouched
//! - **Delete**: idempotent removal
//! - **Round-trip**: stored graphs come back structurally identical
//! - **Concurrency**: parallel writers against one store
//!
//! # Usage
//!
//! Store crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use provenant_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryGraphStore::new() }).await;
//!     assert_eq!(report.failed(), 0, "{report}");
//! }
//! ```

mod concurrent;
mod crud;
mod delete;
mod descriptor;
mod roundtrip;

use std::fmt;
use std::future::Future;

use provenant_graph::{
    ActionCategory, ActionMetaData, ActionOperation, Graph, GraphDesc, InverseAction, NewAction,
    NewSlide, ObjectCategory, ObjectRef, SerializedGraph, SlidePosition,
};

use crate::GraphStore;

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub category: &'static str,
    pub name: &'static str,
    pub outcome: Result<(), String>,
}

impl Check {
    fn new(category: &'static str, name: &'static str, outcome: Result<(), String>) -> Self {
        Check {
            category,
            name,
            outcome,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every check of one suite run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub checks: Vec<Check>,
}

impl ConformanceReport {
    pub fn total(&self) -> usize {
        self.checks.len()
    }

    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed())
    }

    /// `(category, passed, total)` per category, in suite order.
    pub fn by_category(&self) -> Vec<(&'static str, usize, usize)> {
        let mut summary: Vec<(&'static str, usize, usize)> = Vec::new();
        for check in &self.checks {
            let pos = match summary.iter().position(|(c, _, _)| *c == check.category) {
                Some(pos) => pos,
                None => {
                    summary.push((check.category, 0, 0));
                    summary.len() - 1
                }
            };
            summary[pos].2 += 1;
            if check.passed() {
                summary[pos].1 += 1;
            }
        }
        summary
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph store conformance {}/{}", self.passed(), self.total())?;
        for (category, passed, total) in self.by_category() {
            write!(f, " {category}={passed}/{total}")?;
        }
        for check in self.failures() {
            if let Err(reason) = &check.outcome {
                write!(f, "\n  {}::{} failed: {reason}", check.category, check.name)?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a graph store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: GraphStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut report = ConformanceReport::default();
    report.checks.extend(crud::run_crud_tests(&factory).await);
    report.checks.extend(descriptor::run_descriptor_tests(&factory).await);
    report.checks.extend(delete::run_delete_tests(&factory).await);
    report.checks.extend(roundtrip::run_roundtrip_tests(&factory).await);
    report.checks.extend(concurrent::run_concurrent_tests(&factory).await);
    tracing::debug!(passed = report.passed(), total = report.total(), "conformance suite finished");
    report
}

// ── Helpers: documents with sensible defaults ───────────────────────────────

/// A graph holding only its root state.
fn empty_graph(id: &str) -> SerializedGraph {
    Graph::new().to_serialized(GraphDesc::new(id, format!("graph {id}"), "conformance"))
}

/// A small session: one created view, a parameter change with its inverse,
/// and a two-slide story (one text slide, one state slide).
fn story_graph(id: &str) -> Result<SerializedGraph, String> {
    let mut graph = Graph::new();
    let view = graph.add_object(ObjectRef::detached(
        "scatterplot",
        ObjectCategory::Visual,
        "view-1",
    ));
    let meta = |name: &str, op| {
        ActionMetaData::at(name, ActionCategory::Visual, op, 1_700_000_000_000)
    };

    let (_, created) = graph
        .add_action(
            graph.root(),
            NewAction {
                f_id: "addView".to_string(),
                meta: meta("Add scatterplot", ActionOperation::Create),
                parameter: serde_json::json!({"kind": "scatter"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                requires: Vec::new(),
                creates: vec![view],
                removes: Vec::new(),
                inverse: Some(InverseAction {
                    f_id: "removeView".to_string(),
                    meta: meta("Remove scatterplot", ActionOperation::Remove),
                    parameter: Default::default(),
                    inputs: vec![view],
                }),
                inverses: None,
            },
            "scatterplot added",
        )
        .map_err(|e| format!("add_action addView: {e}"))?;
    let (_, zoomed) = graph
        .add_action(
            created,
            NewAction {
                f_id: "setParameter".to_string(),
                meta: meta("Zoom in", ActionOperation::Update),
                parameter: serde_json::json!({"name": "zoom", "value": 2.5, "old": 1.0})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                requires: vec![view],
                creates: Vec::new(),
                removes: Vec::new(),
                inverse: None,
                inverses: None,
            },
            "zoomed",
        )
        .map_err(|e| format!("add_action setParameter: {e}"))?;
    graph
        .set_state_attr(zoomed, "thumbnail", serde_json::json!("data:image/png;base64,AAAA"))
        .map_err(|e| format!("set_state_attr: {e}"))?;

    let intro = graph
        .add_slide(NewSlide::text("Intro", "# Findings"), SlidePosition::Head)
        .map_err(|e| format!("add_slide text: {e}"))?;
    graph
        .add_slide(
            NewSlide::for_state("Zoomed in", zoomed).with_duration(3_000),
            SlidePosition::After(intro),
        )
        .map_err(|e| format!("add_slide state: {e}"))?;

    let mut desc = GraphDesc::new(id, "story", "conformance");
    desc.description = "a recorded exploration".to_string();
    desc.attrs.insert("tags".to_string(), serde_json::json!(["demo"]));
    Ok(graph.to_serialized(desc))
}

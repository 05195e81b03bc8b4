//! Object references: named, categorized handles to runtime values.
//!
//! An [`ObjectRef`] is what commands receive as inputs and hand back as
//! created or removed artifacts. The value behind a handle is shared between
//! all clones of the handle and resolves at most once.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::ResolveError;
use crate::graph::NodeId;

/// A type-erased runtime value held by an object reference.
pub type ObjectValue = Arc<dyn Any + Send + Sync>;

/// Boxed future used by lazy object loaders.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<ObjectValue, String>> + Send + Sync>;

/// Grouping tag of an object, used by UI and analytics layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCategory {
    Data,
    Visual,
    Selection,
    Operation,
    Custom,
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectCategory::Data => "data",
            ObjectCategory::Visual => "visual",
            ObjectCategory::Selection => "selection",
            ObjectCategory::Operation => "operation",
            ObjectCategory::Custom => "custom",
        };
        f.write_str(s)
    }
}

struct ValueSlot {
    cell: OnceCell<ObjectValue>,
    loader: Option<Loader>,
}

/// A named handle to a runtime value.
///
/// `hash` is the stable identity of the handle: it survives persistence and
/// is used to re-bind restored object nodes to the values produced when
/// their creating actions are replayed.
#[derive(Clone)]
pub struct ObjectRef {
    name: String,
    category: ObjectCategory,
    hash: String,
    slot: Arc<ValueSlot>,
}

impl ObjectRef {
    /// A handle with an already available value.
    pub fn new<T>(
        name: impl Into<String>,
        category: ObjectCategory,
        hash: impl Into<String>,
        value: T,
    ) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_value(name, category, hash, Arc::new(value))
    }

    /// A handle wrapping an existing shared value.
    pub fn from_value(
        name: impl Into<String>,
        category: ObjectCategory,
        hash: impl Into<String>,
        value: ObjectValue,
    ) -> Self {
        ObjectRef {
            name: name.into(),
            category,
            hash: hash.into(),
            slot: Arc::new(ValueSlot {
                cell: OnceCell::new_with(Some(value)),
                loader: None,
            }),
        }
    }

    /// A handle whose value is produced by `loader` on first resolution.
    ///
    /// Concurrent resolutions share one load. A failed load leaves the handle
    /// unresolved so a later `resolve` retries.
    pub fn lazy<F, Fut>(
        name: impl Into<String>,
        category: ObjectCategory,
        hash: impl Into<String>,
        loader: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ObjectValue, String>> + Send + 'static,
    {
        let loader: Loader = Arc::new(move || Box::pin(loader()) as BoxFuture<'static, _>);
        ObjectRef {
            name: name.into(),
            category,
            hash: hash.into(),
            slot: Arc::new(ValueSlot {
                cell: OnceCell::new(),
                loader: Some(loader),
            }),
        }
    }

    /// A handle without a value, as produced when restoring a persisted graph.
    pub fn detached(
        name: impl Into<String>,
        category: ObjectCategory,
        hash: impl Into<String>,
    ) -> Self {
        ObjectRef {
            name: name.into(),
            category,
            hash: hash.into(),
            slot: Arc::new(ValueSlot {
                cell: OnceCell::new(),
                loader: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ObjectCategory {
        self.category
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether a value is bound without needing to load it.
    pub fn is_resolved(&self) -> bool {
        self.slot.cell.initialized()
    }

    /// Whether the handle can never produce a value on its own.
    pub fn is_detached(&self) -> bool {
        !self.is_resolved() && self.slot.loader.is_none()
    }

    /// Whether both handles share the same value slot.
    pub fn same_slot(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Resolve the referenced value. Repeated calls return the same value.
    pub async fn resolve(&self) -> Result<ObjectValue, ResolveError> {
        if let Some(value) = self.slot.cell.get() {
            return Ok(value.clone());
        }
        let Some(loader) = self.slot.loader.clone() else {
            return Err(ResolveError::Detached {
                name: self.name.clone(),
            });
        };
        self.slot
            .cell
            .get_or_try_init(|| loader())
            .await
            .cloned()
            .map_err(|message| ResolveError::Load {
                name: self.name.clone(),
                message,
            })
    }

    /// Resolve and downcast the referenced value.
    pub async fn resolve_as<T>(&self) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
    {
        self.resolve()
            .await?
            .downcast::<T>()
            .map_err(|_| ResolveError::TypeMismatch {
                name: self.name.clone(),
            })
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("hash", &self.hash)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// An object reference registered in a graph.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub id: NodeId,
    pub object: ObjectRef,
}

impl ObjectNode {
    pub fn name(&self) -> &str {
        self.object.name()
    }

    pub fn hash(&self) -> &str {
        self.object.hash()
    }

    pub fn category(&self) -> ObjectCategory {
        self.object.category()
    }
}

//! Provenance execution engine.
//!
//! - [`CommandRegistry`] maps stable command ids (`f_id`) to [`Command`]
//!   implementations. It is built once with a [`CommandRegistryBuilder`] and
//!   then shared read-only.
//! - [`ProvenanceGraph`] executes actions, records them with their inverses,
//!   and moves between states by undo and jump-to replay. Mutations are
//!   queued in FIFO order; at most one is in flight.
//! - [`GraphManager`] lists, loads, stores, imports and clones graphs
//!   against a [`GraphStore`](provenant_storage::GraphStore).
//!
//! ```ignore
//! let mut builder = CommandRegistryBuilder::new();
//! builder.register("setParameter", command_fn(set_parameter))?;
//! let manager = GraphManager::new(MemoryGraphStore::new(), builder.build(), EngineConfig::default());
//!
//! let graph = manager.create("exploration").await?;
//! graph.push(ActionDescriptor::new("setParameter", meta).with_input(view)).await?;
//! graph.undo().await?;
//! manager.save(&graph).await?;
//! ```

mod command;
mod config;
mod error;
mod events;
mod manager;
mod provenance;
mod registry;

pub use command::{command_fn, Command, CommandContext, CommandError, CommandOutcome};
pub use config::{read_engine_config, ConfigError, EngineConfig};
pub use error::ProvenanceError;
pub use events::{GraphEvent, Observers, SubscriptionId};
pub use manager::GraphManager;
pub use provenance::{Phase, ProvenanceGraph, CURRENT_STATE_ATTR};
pub use registry::{CommandRegistry, CommandRegistryBuilder, RegistryError};

//! Path compression for provenance graphs.
//!
//! A path is an ordered list of executed actions. The functions here rewrite
//! a path into a shorter one that replays to an equivalent state:
//!
//! - [`last_only`] keeps only the last action per key of one command
//! - [`last_consecutive`] collapses runs of adjacent same-key actions
//! - [`create_remove`] cancels create/remove pairs and the actions in between
//!   that touched the discarded object
//!
//! All functions are pure: the input slice is never modified and the relative
//! order of retained actions is preserved. [`CompressionPipeline`] chains
//! them according to configuration.

mod consecutive;
mod create_remove;
mod last_only;
mod pipeline;
mod shape;

pub use consecutive::{last_consecutive, remove_consecutive_nodes};
pub use create_remove::create_remove;
pub use last_only::last_only;
pub use pipeline::{CompressionPipeline, CompressionRule, Compressor, RuleCompressor};
pub use shape::ActionShape;

#[cfg(test)]
mod test_support;

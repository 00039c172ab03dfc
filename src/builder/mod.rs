//! Builder API for declaring machines.
//!
//! A configuration is assembled from [`StateNode`]s with fluent builders,
//! validated once by [`MachineBuilder::build`], and then used as a factory:
//! every [`MachineConfig::create`] call yields an independent machine that
//! shares the state table with its siblings.

pub mod error;
pub mod machine;
pub mod macros;
pub mod node;

pub use error::BuildError;
pub use machine::{InstanceOptions, MachineBuilder, MachineConfig};
pub use node::{DelayedTransition, EventHandler, StateNode};

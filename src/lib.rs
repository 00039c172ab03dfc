//! Chartwell: a declarative finite-state-machine runtime
//!
//! A machine is declared once as a table of states, each with optional entry
//! and exit hooks, an event table and delayed transitions. The resulting
//! configuration spawns independent machines that own a copy of the context,
//! dispatch events, keep guarded fields valid and notify subscribers.
//!
//! # Core Concepts
//!
//! - **State / Event**: closed sets of values via the `State` and `Event` traits
//! - **Context**: application data carried across states, compared structurally
//! - **Guards**: per-field predicates that revert rejected mutations
//! - **Delayed transitions**: `after` timers scheduled on tokio
//! - **Subscriptions**: synchronous `StateChange` / `ContextChange` callbacks
//!
//! # Example
//!
//! ```rust
//! use chartwell::builder::{EventHandler, MachineBuilder, StateNode};
//! use chartwell::core::Event;
//! use chartwell::state_enum;
//!
//! state_enum! {
//!     enum Mode {
//!         Reading,
//!         Editing,
//!     }
//! }
//!
//! #[derive(Debug)]
//! enum Edit {
//!     Begin,
//!     Type(String),
//!     Save,
//! }
//!
//! impl Event for Edit {
//!     fn name(&self) -> &str {
//!         match self {
//!             Self::Begin | Self::Type(_) => "edit",
//!             Self::Save => "save",
//!         }
//!     }
//! }
//!
//! #[derive(Clone, PartialEq, Debug, Default)]
//! struct Doc {
//!     committed: String,
//!     value: String,
//! }
//!
//! let config = MachineBuilder::new()
//!     .initial(Mode::Reading)
//!     .context(Doc::default())
//!     .state(Mode::Reading, StateNode::new().on("edit", EventHandler::to(Mode::Editing)))
//!     .state(
//!         Mode::Editing,
//!         StateNode::new()
//!             .on(
//!                 "save",
//!                 EventHandler::to(Mode::Reading)
//!                     .action(|doc: &mut Doc, _| doc.committed = doc.value.clone()),
//!             )
//!             .on(
//!                 "edit",
//!                 EventHandler::new().action(|doc: &mut Doc, event: &Edit| {
//!                     if let Edit::Type(text) = event {
//!                         doc.value = text.clone();
//!                     }
//!                 }),
//!             ),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let machine = config.create();
//! machine.start().unwrap();
//! machine.send(Edit::Begin).unwrap();
//! machine.send(Edit::Type("A".into())).unwrap();
//! machine.send(Edit::Save).unwrap();
//!
//! let snapshot = machine.snapshot();
//! assert_eq!(snapshot.state, Mode::Reading);
//! assert_eq!(snapshot.context.committed, "A");
//! ```

pub mod builder;
pub mod core;
pub mod engine;

// Re-export commonly used types
pub use builder::{
    BuildError, DelayedTransition, EventHandler, InstanceOptions, MachineBuilder, MachineConfig,
    StateNode,
};
pub use core::{Context, Event, FieldGuard, State, StateHistory, StateTransition, TransitionCause};
pub use engine::{ChangeKind, Machine, MachineError, OwnedSnapshot, Snapshot, Subscription, TimerPolicy};

//! Core machine vocabulary.
//!
//! This module contains the value types the engine is built from:
//! - States, events and contexts via the `State`, `Event` and `Context` traits
//! - Field-scoped guards over the machine context
//! - Transition history tracking
//!
//! Nothing here schedules work or notifies anyone; that lives in `engine`.

mod guard;
mod history;
mod state;

pub use guard::{FieldGuard, GuardSet};
pub use history::{StateHistory, StateTransition, TransitionCause};
pub use state::{Context, Event, State};

//! The transition engine.
//!
//! A [`Machine`] owns its current state, context and pending timers, and
//! executes everything synchronously under one lock:
//!
//! - **Dispatch**: `send` looks the event up in the current state's table
//! - **Guarded actions**: actions mutate the context, guards revert rejected
//!   fields, and a `ContextChange` is emitted only if something changed
//! - **Transitions**: exit (only when the state changes), entry,
//!   `StateChange`, then delayed transitions are scheduled
//! - **Timers**: delayed transitions run on tokio and re-enter the engine

mod error;
mod machine;
mod subscription;
mod timer;

pub use error::MachineError;
pub use machine::Machine;
pub use subscription::{ChangeKind, OwnedSnapshot, Snapshot, Subscription};
pub use timer::TimerPolicy;

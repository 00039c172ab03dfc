//! State and event traits for machine definitions.
//!
//! States name "where" a machine is; events name "what happened". Both are
//! plain values, usually enums, and are compared or looked up by name.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for state machine states.
///
/// A state is a value drawn from a closed set declared up front. It is used
/// as the key into a machine's state table, so it must be hashable and
/// comparable by equality.
///
/// # Required Traits
///
/// - `Clone`: the current state is handed out in snapshots and history
/// - `Eq` + `Hash`: states key the state table
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: snapshots and history are serializable
///
/// # Example
///
/// ```rust
/// use chartwell::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum DoorState {
///     Open,
///     Closed,
///     Broken,
/// }
///
/// impl State for DoorState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///             Self::Broken => "Broken",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Broken)
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Broken)
///     }
/// }
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Purely informational: the engine does not refuse events in final
    /// states. Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

/// Trait for events sent to a machine.
///
/// Events are a tagged sum type: each variant carries its own payload and
/// reports a stable name. Handlers are registered per name, and the action
/// receives the whole event value so it can destructure its payload.
///
/// # Example
///
/// ```rust
/// use chartwell::core::Event;
///
/// #[derive(Debug)]
/// enum EditorEvent {
///     Edit(Option<String>),
///     Save,
/// }
///
/// impl Event for EditorEvent {
///     fn name(&self) -> &str {
///         match self {
///             Self::Edit(_) => "edit",
///             Self::Save => "save",
///         }
///     }
/// }
///
/// assert_eq!(EditorEvent::Edit(Some("A".into())).name(), "edit");
/// ```
pub trait Event: Debug + Send + Sync + 'static {
    /// Name used to look the event up in a state's handler table.
    fn name(&self) -> &str;
}

impl Event for &'static str {
    fn name(&self) -> &str {
        self
    }
}

impl Event for String {
    fn name(&self) -> &str {
        self.as_str()
    }
}

/// Data carried by a machine across all of its states.
///
/// Contexts are compared with `PartialEq` to decide whether an action
/// changed anything, and cloned to snapshot the pre-action value that guards
/// restore from. Implemented for every type with those capabilities.
pub trait Context: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Context for T where T: Clone + PartialEq + Send + Sync + 'static {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashSet;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Running,
        Done,
        Crashed,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Running => "Running",
                Self::Done => "Done",
                Self::Crashed => "Crashed",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Done | Self::Crashed)
        }

        fn is_error(&self) -> bool {
            matches!(self, Self::Crashed)
        }
    }

    #[derive(Debug)]
    enum TestEvent {
        Go,
        Fail { reason: String },
    }

    impl Event for TestEvent {
        fn name(&self) -> &str {
            match self {
                Self::Go => "go",
                Self::Fail { .. } => "fail",
            }
        }
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(TestState::Idle.name(), "Idle");
        assert_eq!(TestState::Running.name(), "Running");
        assert_eq!(TestState::Done.name(), "Done");
        assert_eq!(TestState::Crashed.name(), "Crashed");
    }

    #[test]
    fn default_flags_and_overrides() {
        assert!(!TestState::Idle.is_final());
        assert!(TestState::Done.is_final());
        assert!(!TestState::Done.is_error());
        assert!(TestState::Crashed.is_error());
    }

    #[test]
    fn states_can_key_hash_sets() {
        let set: HashSet<TestState> = [TestState::Idle, TestState::Idle, TestState::Done]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn state_serializes_correctly() {
        let json = serde_json::to_string(&TestState::Running).unwrap();
        let back: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TestState::Running);
    }

    #[test]
    fn event_name_ignores_payload() {
        let event = TestEvent::Fail {
            reason: "disk full".to_string(),
        };
        assert_eq!(event.name(), "fail");
        assert!(matches!(event, TestEvent::Fail { reason } if reason == "disk full"));
        assert_eq!(TestEvent::Go.name(), "go");
    }

    #[test]
    fn string_events_use_their_contents() {
        assert_eq!("edit".name(), "edit");
        assert_eq!(String::from("save").name(), "save");
    }
}

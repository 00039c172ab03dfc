//! State transition history tracking.
//!
//! Every transition a machine performs is recorded with its cause and a
//! timestamp. History is append-only; `record` returns a new history so a
//! caller holding a clone never sees it change underneath.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What triggered a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// `Machine::start` entering the initial state.
    Start,
    /// An event handler's target, by event name.
    Event(String),
    /// A delayed transition firing after the given delay.
    After(Duration),
}

/// Record of a single state transition.
///
/// # Example
///
/// ```rust
/// use chartwell::core::{State, StateTransition, TransitionCause};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Light {
///     Red,
///     Green,
/// }
///
/// impl State for Light {
///     fn name(&self) -> &str {
///         match self {
///             Self::Red => "Red",
///             Self::Green => "Green",
///         }
///     }
/// }
///
/// let transition = StateTransition {
///     from: Light::Red,
///     to: Light::Green,
///     timestamp: Utc::now(),
///     cause: TransitionCause::Event("go".into()),
/// };
/// assert!(!transition.is_reentry());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// What triggered it
    pub cause: TransitionCause,
}

impl<S: State> StateTransition<S> {
    /// True when the transition re-entered the state it left.
    pub fn is_reentry(&self) -> bool {
        self.from == self.to
    }
}

/// Ordered history of state transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// The existing history is left unchanged.
    pub fn record(&self, transition: StateTransition<S>) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Append in place. Used by the engine, which owns its history.
    pub(crate) fn push(&mut self, transition: StateTransition<S>) {
        self.transitions.push(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the first transition followed by the `to`
    /// state of each transition. Re-entries appear twice in a row.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Calculate total duration from first to last transition.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Get all transitions in order.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Busy,
        Done,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Busy => "Busy",
                Self::Done => "Done",
            }
        }
    }

    fn transition(from: TestState, to: TestState, cause: TransitionCause) -> StateTransition<TestState> {
        StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            cause,
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<TestState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = StateHistory::new();
        let new_history = history.record(transition(
            TestState::Idle,
            TestState::Busy,
            TransitionCause::Event("work".into()),
        ));

        assert_eq!(history.len(), 0);
        assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn get_path_includes_reentries() {
        let mut history = StateHistory::new();
        history.push(transition(TestState::Idle, TestState::Idle, TransitionCause::Start));
        history.push(transition(
            TestState::Idle,
            TestState::Busy,
            TransitionCause::Event("work".into()),
        ));
        history.push(transition(
            TestState::Busy,
            TestState::Done,
            TransitionCause::After(Duration::from_millis(50)),
        ));

        let path = history.get_path();
        assert_eq!(
            path,
            vec![&TestState::Idle, &TestState::Idle, &TestState::Busy, &TestState::Done]
        );
        assert!(history.transitions()[0].is_reentry());
        assert!(!history.transitions()[1].is_reentry());
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let mut history = StateHistory::new();
        history.push(transition(TestState::Idle, TestState::Busy, TransitionCause::Start));

        std::thread::sleep(Duration::from_millis(10));

        history.push(transition(
            TestState::Busy,
            TestState::Done,
            TransitionCause::Event("finish".into()),
        ));

        assert!(history.duration().unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn history_serializes_with_causes() {
        let history = StateHistory::new().record(transition(
            TestState::Idle,
            TestState::Done,
            TransitionCause::After(Duration::from_millis(100)),
        ));

        let json = serde_json::to_string(&history).unwrap();
        let back: StateHistory<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(
            back.transitions()[0].cause,
            TransitionCause::After(Duration::from_millis(100))
        );
    }
}

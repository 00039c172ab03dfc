//! Errors raised by a running machine.

use thiserror::Error;

/// Errors returned from [`Machine::start`](super::Machine::start) and
/// [`Machine::send`](super::Machine::send).
///
/// Errors abort the call at the point of failure. Work already done in the
/// same call is kept: an action may have changed the context, and
/// subscribers may have been notified, before a later step failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("State '{state}' is not defined")]
    UnknownState { state: String },

    #[error("State '{state}' does not handle any events")]
    MissingEventTable { state: String },

    #[error("State '{state}' has no handler for event '{event}'")]
    UnknownEvent { state: String, event: String },

    #[error("State '{state}' has delayed transitions but no tokio runtime is available")]
    NoRuntime { state: String },

    #[error("'{operation}' was called from a hook, action or subscriber of the same machine")]
    Reentrant { operation: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_state_and_event() {
        let err = MachineError::UnknownEvent {
            state: "Reading".into(),
            event: "save".into(),
        };
        assert_eq!(err.to_string(), "State 'Reading' has no handler for event 'save'");

        let err = MachineError::MissingEventTable {
            state: "Done".into(),
        };
        assert_eq!(err.to_string(), "State 'Done' does not handle any events");

        let err = MachineError::Reentrant { operation: "start" };
        assert_eq!(
            err.to_string(),
            "'start' was called from a hook, action or subscriber of the same machine"
        );
    }
}

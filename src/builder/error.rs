//! Build errors for machine configurations.

use thiserror::Error;

/// Errors that can occur when building a machine configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Initial context not specified. Call .context(value) before .build()")]
    MissingContext,

    #[error("No states defined. Add at least one state with .state(id, node)")]
    NoStates,
}

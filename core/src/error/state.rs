use thiserror::Error;

/// Structural misuse of the global state store.
///
/// Listener failures are never surfaced through this type; they are logged and
/// isolated inside the broadcast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("global state has not been initialized")]
    NotInitialized,
    #[error("global state is already initialized")]
    DuplicateInit,
    #[error("global state must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

use thiserror::Error;

use super::state::StateError;
use crate::lifecycle::TransitionError;

/// Errors raised while the host drives a guest through its lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("mount target {container} for app {app} not found")]
    MissingMountTarget { app: String, container: String },

    #[error("app {app}: {source}")]
    Transition {
        app: String,
        #[source]
        source: TransitionError,
    },

    #[error("app {0} is already registered")]
    DuplicateApp(String),

    #[error("app {0} is not registered")]
    UnknownApp(String),

    #[error("app {app} {hook} failed: {source}")]
    Guest {
        app: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("state error: {0}")]
    State(#[from] StateError),
}

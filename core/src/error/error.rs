use thiserror::Error;

use super::lifecycle::LifecycleError;
use super::state::StateError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("script error: {0}")]
    Script(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

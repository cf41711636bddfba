use chrono::Utc;
use microhost_core::error::StateError;
use microhost_core::state::StateSnapshot;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("not running under a host, cross-app messaging is disabled")]
    NotHosted,
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Build the `{message, from, timestamp}` update both panels publish.
pub fn compose_message(text: &str, from: &str) -> Result<StateSnapshot, PanelError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PanelError::EmptyMessage);
    }
    let payload: Value = json!({
        "message": text,
        "from": from,
        "timestamp": Utc::now().timestamp_millis(),
    });
    Ok(StateSnapshot::from_value(payload)?)
}

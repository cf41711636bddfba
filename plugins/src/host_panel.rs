//! 主应用首页的通信面板

use microhost_core::error::StateError;
use microhost_core::state::{StateActions, StateSnapshot, Subscription};

use crate::message::{compose_message, PanelError};

pub const HOST_APP_NAME: &str = "main-app";

/// 主应用向全局状态发送消息
#[derive(Debug, Clone)]
pub struct HostPanel {
    actions: StateActions,
}

impl HostPanel {
    pub fn new(actions: StateActions) -> Self {
        Self { actions }
    }

    /// 发送消息，返回写入的 partial
    pub fn send(&self, text: &str) -> Result<StateSnapshot, PanelError> {
        let partial = compose_message(text, HOST_APP_NAME)?;
        self.actions.set_global_state(partial.clone())?;
        tracing::info!(from = HOST_APP_NAME, message = text.trim(), "message sent to global state");
        Ok(partial)
    }
}

/// 主应用启动时注册的日志监听器
pub fn install_state_logger(actions: &StateActions) -> Result<Subscription, StateError> {
    actions.on_global_state_change(
        |current, previous| {
            tracing::info!(
                state = %current.to_value(),
                prev = %previous.to_value(),
                "[{}] global state changed",
                HOST_APP_NAME
            );
            Ok(())
        },
        false,
    )
}

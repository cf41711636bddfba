//! 子应用：显示收到的全局状态，并可向主应用发送消息
//!
//! 运行环境检测只看 mount props 里有没有 `actions`：由主应用挂载时启用跨应用通信，
//! 独立运行时禁用发送，只渲染提示。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use microhost_core::lifecycle::{GuestApp, GuestRuntime, MountProps, MountTarget};
use microhost_core::state::{StateActions, StateSnapshot, SubscriptionSet};

use crate::message::{compose_message, PanelError};

/// 独立运行时使用的挂载点
pub const STANDALONE_ROOT: &str = "#micro-root";

#[derive(Default)]
struct PanelState {
    bootstrapped: bool,
    runtime: Option<GuestRuntime>,
    actions: Option<StateActions>,
    target: Option<MountTarget>,
    subscriptions: SubscriptionSet,
}

/// 消息面板子应用。克隆得到的是同一个实例的句柄：一份交给主应用编排，一份留给 UI 操作。
#[derive(Clone)]
pub struct MessagePanelGuest {
    name: String,
    state: Arc<Mutex<PanelState>>,
    received: Arc<Mutex<Option<StateSnapshot>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessagePanelGuest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(PanelState::default())),
            received: Arc::new(Mutex::new(None)),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.name
    }

    /// 独立运行：自行创建挂载点并以无 actions 的 props 挂载
    pub async fn run_standalone(&mut self) -> anyhow::Result<MountTarget> {
        let target = MountTarget::new(STANDALONE_ROOT);
        let props = MountProps::standalone(self.name.clone(), target.clone());
        self.bootstrap().await?;
        self.mount(&props).await?;
        Ok(target)
    }

    pub fn runtime(&self) -> Option<GuestRuntime> {
        lock(&self.state).runtime
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.state).target.is_some()
    }

    /// 最近一次收到的全局状态
    pub fn last_received(&self) -> Option<StateSnapshot> {
        lock(&self.received).clone()
    }

    /// 当前渲染内容，未挂载时为 `None`
    pub fn view(&self) -> Option<String> {
        lock(&self.state).target.as_ref().map(MountTarget::content)
    }

    /// 向主应用发送消息
    pub fn send(&self, text: &str) -> Result<(), PanelError> {
        let actions = lock(&self.state).actions.clone();
        let Some(actions) = actions else {
            tracing::warn!(app = %self.name, "no host detected, message not sent");
            return Err(PanelError::NotHosted);
        };
        let partial = compose_message(text, &self.name)?;
        actions.set_global_state(partial)?;
        tracing::info!(app = %self.name, message = text.trim(), "message sent to host");
        Ok(())
    }
}

fn render_view(name: &str, runtime: GuestRuntime, state: Option<&StateSnapshot>) -> String {
    let mut out = format!("[{name}] runtime: {}\n", runtime.label());
    match runtime {
        GuestRuntime::Standalone => {
            out.push_str("messaging disabled: not running under a host\n");
        }
        GuestRuntime::Hosted => {
            out.push_str("received global state:\n");
            let body = state
                .and_then(|s| s.to_json_pretty().ok())
                .unwrap_or_else(|| "(no data)".to_string());
            out.push_str(&body);
            out.push('\n');
        }
    }
    out
}

#[async_trait]
impl GuestApp for MessagePanelGuest {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bootstrap(&mut self) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.bootstrapped {
            return Ok(());
        }
        state.bootstrapped = true;
        tracing::info!(app = %self.name, "bootstrap");
        Ok(())
    }

    async fn mount(&mut self, props: &MountProps) -> anyhow::Result<()> {
        let runtime = props.runtime();
        tracing::info!(app = %self.name, container = props.container.selector(), runtime = runtime.label(), "mount");

        let mut state = lock(&self.state);
        // 重复挂载时先释放上一次的订阅
        state.subscriptions.clear();
        state.runtime = Some(runtime);
        state.target = Some(props.container.clone());
        state.actions = props.actions.clone();

        match props.actions.as_ref() {
            Some(actions) => {
                let name = self.name.clone();
                let target = props.container.clone();
                let received = Arc::clone(&self.received);
                let sub = actions.on_global_state_change(
                    move |current, previous| {
                        tracing::debug!(
                            app = %name,
                            state = %current.to_value(),
                            prev = %previous.to_value(),
                            "global state received"
                        );
                        *lock(&received) = Some(current.clone());
                        target.render(render_view(&name, GuestRuntime::Hosted, Some(current)));
                        Ok(())
                    },
                    true,
                )?;
                state.subscriptions.push(sub);
            }
            None => {
                props
                    .container
                    .render(render_view(&self.name, runtime, None));
            }
        }
        Ok(())
    }

    async fn unmount(&mut self, _props: &MountProps) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        let removed = state.subscriptions.clear();
        if let Some(target) = state.target.take() {
            target.clear();
        }
        state.actions = None;
        state.runtime = None;
        tracing::info!(app = %self.name, listeners = removed, "unmount");
        Ok(())
    }
}

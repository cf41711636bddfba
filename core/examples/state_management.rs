//! 全局状态与生命周期使用示例
//!
//! 演示主应用如何初始化全局状态、挂载子应用，并在卸载后停止向其推送更新

use anyhow::Result;
use async_trait::async_trait;
use microhost_core::lifecycle::{
    ActiveRule, GuestApp, Host, HostEvent, MicroApp, MountDescriptor, MountProps,
};
use microhost_core::state::{GlobalState, StateSnapshot, SubscriptionSet};
use serde_json::json;

/// 把收到的 `message` 渲染到挂载点的最小子应用
struct EchoGuest {
    subscriptions: SubscriptionSet,
}

#[async_trait]
impl GuestApp for EchoGuest {
    fn name(&self) -> &str {
        "echo"
    }

    async fn bootstrap(&mut self) -> Result<()> {
        Ok(())
    }

    async fn mount(&mut self, props: &MountProps) -> Result<()> {
        let Some(actions) = props.actions.as_ref() else {
            props.container.render("standalone");
            return Ok(());
        };
        let target = props.container.clone();
        let sub = actions.on_global_state_change(
            move |current, _prev| {
                let msg = current.get_str("message").unwrap_or("(none)");
                target.render(format!("echo: {msg}"));
                Ok(())
            },
            true,
        )?;
        self.subscriptions.push(sub);
        Ok(())
    }

    async fn unmount(&mut self, _props: &MountProps) -> Result<()> {
        self.subscriptions.clear();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    // 1. 创建全局状态
    let store = GlobalState::new();
    let actions =
        store.init_global_state(StateSnapshot::from_value(json!({"user": "main-app user"}))?)?;
    let _logger = actions.on_global_state_change(
        |current, prev| {
            println!("🔄 state {} -> {}", prev.to_value(), current.to_value());
            Ok(())
        },
        false,
    )?;

    // 2. 创建主应用并启动事件监听器（后台任务）
    let mut host = Host::new(store.clone());
    let mut event_rx = host.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                HostEvent::AppTransitioned { app, from, to, .. } => {
                    println!("→ {} {} → {}", app, from, to);
                }
                HostEvent::MountFailed { app, error, .. } => {
                    println!("✗ {} failed: {}", app, error);
                }
                HostEvent::HostShutdown { .. } => break,
                _ => {}
            }
        }
    });

    // 3. 注册子应用
    host.add_layout(ActiveRule::prefix("/echo"), "#echo");
    host.register_micro_apps(vec![MicroApp::new(
        MountDescriptor::new("echo", "//localhost:3001", "#echo", ActiveRule::prefix("/echo")),
        EchoGuest {
            subscriptions: SubscriptionSet::new(),
        },
    )])?;
    host.start().await;

    // 4. 路由切换
    host.navigate("/echo").await.into_result()?;
    actions.set_global_state(StateSnapshot::from_value(json!({"message": "hello"}))?)?;
    if let Some(target) = host.containers().get("#echo") {
        println!("📺 {}", target.content());
    }

    host.navigate("/").await.into_result()?;
    actions.set_global_state(StateSnapshot::from_value(json!({"message": "nobody home"}))?)?;
    println!("👂 listeners after unmount: {}", store.listener_count());

    // 5. 关闭
    host.shutdown().await.into_result()?;
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    println!("\n✅ Example completed successfully");
    Ok(())
}

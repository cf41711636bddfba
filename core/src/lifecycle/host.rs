//! 主应用编排器
//!
//! 持有 `{descriptor, guest}` 列表，按当前路径匹配每个子应用的激活规则，
//! 驱动 bootstrap / mount / unmount，并通过广播通道发布生命周期事件。

use super::container::{ContainerRegistry, MountTarget};
use super::traits::GuestApp;
use super::transitions::LifecycleTransition;
use super::types::{ActiveRule, AppStatus, HostEvent, LifecycleStep, MountDescriptor, MountProps};
use crate::error::LifecycleError;
use crate::state::GlobalState;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// 待注册的子应用
pub struct MicroApp {
    pub descriptor: MountDescriptor,
    pub guest: Box<dyn GuestApp>,
    /// 挂载时额外传入的自定义 props
    pub props: Map<String, Value>,
}

impl MicroApp {
    pub fn new(descriptor: MountDescriptor, guest: impl GuestApp + 'static) -> Self {
        Self {
            descriptor,
            guest: Box::new(guest),
            props: Map::new(),
        }
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }
}

/// 一次路由切换的结果
#[derive(Debug, Default)]
pub struct NavigationReport {
    pub path: String,
    pub steps: Vec<LifecycleStep>,
    pub failures: Vec<LifecycleError>,
}

impl NavigationReport {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// 有失败时返回第一个失败
    pub fn into_result(self) -> Result<Vec<LifecycleStep>, LifecycleError> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.steps),
        }
    }
}

fn emit(tx: &broadcast::Sender<HostEvent>, event: HostEvent) {
    let _ = tx.send(event);
}

struct AppSlot {
    descriptor: MountDescriptor,
    guest: Box<dyn GuestApp>,
    status: AppStatus,
    custom: Map<String, Value>,
    /// 当前挂载使用的 props，卸载时原样传回
    mounted: Option<MountProps>,
}

impl AppSlot {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn transition(
        &mut self,
        to: AppStatus,
        tx: &broadcast::Sender<HostEvent>,
        report: &mut NavigationReport,
    ) -> Result<(), LifecycleError> {
        LifecycleTransition::validate(self.status, to).map_err(|source| {
            LifecycleError::Transition {
                app: self.descriptor.name.clone(),
                source,
            }
        })?;
        let from = std::mem::replace(&mut self.status, to);
        tracing::info!(app = %self.descriptor.name, %from, %to, "lifecycle transition");
        report.steps.push(LifecycleStep {
            app: self.descriptor.name.clone(),
            from,
            to,
        });
        emit(
            tx,
            HostEvent::AppTransitioned {
                app: self.descriptor.name.clone(),
                from,
                to,
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    async fn bootstrap(
        &mut self,
        tx: &broadcast::Sender<HostEvent>,
        report: &mut NavigationReport,
    ) -> Result<(), LifecycleError> {
        if LifecycleTransition::is_bootstrapped(self.status) {
            return Ok(());
        }
        self.guest
            .bootstrap()
            .await
            .map_err(|source| LifecycleError::Guest {
                app: self.descriptor.name.clone(),
                hook: "bootstrap",
                source,
            })?;
        self.transition(AppStatus::Bootstrapped, tx, report)
    }

    async fn mount(
        &mut self,
        store: &GlobalState,
        container: Option<MountTarget>,
        tx: &broadcast::Sender<HostEvent>,
        report: &mut NavigationReport,
    ) -> Result<(), LifecycleError> {
        self.bootstrap(tx, report).await?;

        let Some(container) = container else {
            return Err(LifecycleError::MissingMountTarget {
                app: self.descriptor.name.clone(),
                container: self.descriptor.container.clone(),
            });
        };

        let props = MountProps {
            name: self.descriptor.name.clone(),
            container,
            actions: Some(store.actions().for_guest(self.descriptor.name.clone())),
            custom: self.custom.clone(),
        };
        if let Err(source) = self.guest.mount(&props).await {
            // 挂载失败前可能已注册监听器或渲染了部分内容，重试前必须清干净
            props.container.clear();
            if let Some(actions) = props.actions.as_ref() {
                let leaked = actions.off_global_state_change();
                if leaked > 0 {
                    tracing::warn!(app = %self.descriptor.name, leaked, "removed listeners left by failed mount");
                }
            }
            return Err(LifecycleError::Guest {
                app: self.descriptor.name.clone(),
                hook: "mount",
                source,
            });
        }
        self.transition(AppStatus::Mounted, tx, report)?;
        self.mounted = Some(props);
        Ok(())
    }

    async fn unmount(
        &mut self,
        tx: &broadcast::Sender<HostEvent>,
        report: &mut NavigationReport,
    ) -> Result<(), LifecycleError> {
        let Some(props) = self.mounted.take() else {
            return Ok(());
        };
        let result = self.guest.unmount(&props).await;

        props.container.clear();
        // 子应用漏掉的监听器由主应用兜底移除，避免再次挂载时出现重复监听
        if let Some(actions) = props.actions.as_ref() {
            let leaked = actions.off_global_state_change();
            if leaked > 0 {
                tracing::warn!(app = %self.descriptor.name, leaked, "guest left listeners behind after unmount");
            }
        }

        self.transition(AppStatus::Unmounted, tx, report)?;
        result.map_err(|source| LifecycleError::Guest {
            app: self.descriptor.name.clone(),
            hook: "unmount",
            source,
        })
    }
}

/// 主应用布局：路由匹配时页面上会渲染出的挂载点
struct LayoutRule {
    rule: ActiveRule,
    container: String,
}

/// 主应用
pub struct Host {
    store: GlobalState,
    containers: ContainerRegistry,
    layout: Vec<LayoutRule>,
    apps: Vec<AppSlot>,
    current_path: Option<String>,
    started: bool,
    event_tx: broadcast::Sender<HostEvent>,
}

impl Host {
    pub fn new(store: GlobalState) -> Self {
        Self::with_event_capacity(store, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(store: GlobalState, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            store,
            containers: ContainerRegistry::new(),
            layout: Vec::new(),
            apps: Vec::new(),
            current_path: None,
            started: false,
            event_tx,
        }
    }

    pub fn store(&self) -> &GlobalState {
        &self.store
    }

    pub fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    /// 订阅生命周期事件
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.event_tx.subscribe()
    }

    /// 声明主应用在 `rule` 匹配时渲染 `container` 挂载点
    pub fn add_layout(&mut self, rule: ActiveRule, container: impl Into<String>) {
        self.layout.push(LayoutRule {
            rule,
            container: container.into(),
        });
    }

    /// 注册子应用；名称重复时整批拒绝
    pub fn register_micro_apps(&mut self, apps: Vec<MicroApp>) -> Result<(), LifecycleError> {
        let mut seen: HashSet<&str> = self.apps.iter().map(AppSlot::name).collect();
        for app in &apps {
            if !seen.insert(app.descriptor.name.as_str()) {
                return Err(LifecycleError::DuplicateApp(app.descriptor.name.clone()));
            }
        }

        for app in apps {
            tracing::info!(
                app = %app.descriptor.name,
                entry = %app.descriptor.entry,
                container = %app.descriptor.container,
                rule = ?app.descriptor.active_rule,
                "micro app registered"
            );
            emit(
                &self.event_tx,
                HostEvent::AppRegistered {
                    app: app.descriptor.name.clone(),
                    timestamp: Utc::now(),
                },
            );
            self.apps.push(AppSlot {
                descriptor: app.descriptor,
                guest: app.guest,
                status: AppStatus::Registered,
                custom: app.props,
                mounted: None,
            });
        }
        Ok(())
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps.iter().map(AppSlot::name).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&MountDescriptor> {
        self.apps
            .iter()
            .find(|s| s.name() == name)
            .map(|s| &s.descriptor)
    }

    pub fn status(&self, name: &str) -> Result<AppStatus, LifecycleError> {
        self.apps
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.status)
            .ok_or_else(|| LifecycleError::UnknownApp(name.to_string()))
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 启动编排；已记录路径时立即按该路径调度
    pub async fn start(&mut self) -> NavigationReport {
        self.started = true;
        tracing::info!(apps = self.apps.len(), "host started");
        match self.current_path.clone() {
            Some(path) => self.reconcile(&path).await,
            None => NavigationReport::default(),
        }
    }

    /// 切换路由：先卸载不再匹配的子应用，再挂载新匹配的子应用。
    ///
    /// 启动前只记录路径。单个子应用失败不会阻止其他子应用的调度。
    pub async fn navigate(&mut self, path: &str) -> NavigationReport {
        self.current_path = Some(path.to_string());
        emit(
            &self.event_tx,
            HostEvent::RouteChanged {
                path: path.to_string(),
                timestamp: Utc::now(),
            },
        );
        if !self.started {
            tracing::debug!(path, "host not started, route recorded");
            return NavigationReport::new(path);
        }
        self.reconcile(path).await
    }

    async fn reconcile(&mut self, path: &str) -> NavigationReport {
        let mut report = NavigationReport::new(path);
        tracing::debug!(path, "reconciling micro apps");

        for slot in self.apps.iter_mut() {
            if slot.status == AppStatus::Mounted && !slot.descriptor.active_rule.matches(path) {
                if let Err(err) = slot.unmount(&self.event_tx, &mut report).await {
                    tracing::error!(app = %slot.descriptor.name, error = %err, "unmount failed");
                    report.failures.push(err);
                }
            }
        }

        self.sync_layout(path);

        for slot in self.apps.iter_mut() {
            if slot.status == AppStatus::Mounted || !slot.descriptor.active_rule.matches(path) {
                continue;
            }
            let container = self.containers.get(&slot.descriptor.container);
            if let Err(err) = slot
                .mount(&self.store, container, &self.event_tx, &mut report)
                .await
            {
                tracing::error!(app = %slot.descriptor.name, status = %slot.status, error = %err, "mount failed");
                emit(
                    &self.event_tx,
                    HostEvent::MountFailed {
                        app: slot.descriptor.name.clone(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    },
                );
                report.failures.push(err);
            }
        }

        report
    }

    fn sync_layout(&self, path: &str) {
        let wanted: HashSet<&str> = self
            .layout
            .iter()
            .filter(|l| l.rule.matches(path))
            .map(|l| l.container.as_str())
            .collect();

        for layout in &self.layout {
            if !wanted.contains(layout.container.as_str()) {
                self.containers.detach(&layout.container);
            }
        }
        for container in wanted {
            self.containers.attach(container);
        }
    }

    /// 卸载全部子应用并关闭全局状态
    pub async fn shutdown(&mut self) -> NavigationReport {
        let mut report = NavigationReport::new(self.current_path.as_deref().unwrap_or(""));
        for slot in self.apps.iter_mut() {
            if slot.status == AppStatus::Mounted {
                if let Err(err) = slot.unmount(&self.event_tx, &mut report).await {
                    tracing::error!(app = %slot.descriptor.name, error = %err, "unmount failed during shutdown");
                    report.failures.push(err);
                }
            }
        }
        self.store.shutdown();
        self.started = false;
        emit(
            &self.event_tx,
            HostEvent::HostShutdown {
                timestamp: Utc::now(),
            },
        );
        tracing::info!("host shut down");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopGuest {
        name: String,
    }

    #[async_trait]
    impl GuestApp for NoopGuest {
        fn name(&self) -> &str {
            &self.name
        }

        async fn bootstrap(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn mount(&mut self, props: &MountProps) -> anyhow::Result<()> {
            props.container.render(format!("{} mounted", self.name));
            Ok(())
        }

        async fn unmount(&mut self, _props: &MountProps) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn noop(name: &str, rule: &str) -> MicroApp {
        MicroApp::new(
            MountDescriptor::new(name, "//localhost:3001", "#micro-container", ActiveRule::prefix(rule)),
            NoopGuest {
                name: name.to_string(),
            },
        )
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut host = Host::new(GlobalState::new());
        host.register_micro_apps(vec![noop("a", "/a")]).unwrap();

        let err = host
            .register_micro_apps(vec![noop("b", "/b"), noop("a", "/a2")])
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateApp(ref n) if n == "a"));
        assert_eq!(host.app_names(), vec!["a"]);
    }

    #[test]
    fn test_status_of_unknown_app() {
        let host = Host::new(GlobalState::new());
        assert!(matches!(
            host.status("missing"),
            Err(LifecycleError::UnknownApp(_))
        ));
    }

    #[tokio::test]
    async fn test_navigate_before_start_only_records_path() {
        let mut host = Host::new(GlobalState::new());
        host.add_layout(ActiveRule::prefix("/micro"), "#micro-container");
        host.register_micro_apps(vec![noop("micro-app", "/micro")]).unwrap();

        let report = host.navigate("/micro").await;
        assert!(report.steps.is_empty());
        assert_eq!(host.status("micro-app").unwrap(), AppStatus::Registered);

        let report = host.start().await;
        assert!(report.is_ok());
        assert_eq!(host.status("micro-app").unwrap(), AppStatus::Mounted);
        assert_eq!(
            host.containers().get("#micro-container").unwrap().content(),
            "micro-app mounted"
        );
    }

    #[tokio::test]
    async fn test_layout_detaches_container_when_route_leaves() {
        let mut host = Host::new(GlobalState::new());
        host.add_layout(ActiveRule::prefix("/micro"), "#micro-container");
        host.start().await;

        host.navigate("/micro").await;
        assert!(host.containers().contains("#micro-container"));
        host.navigate("/").await;
        assert!(!host.containers().contains("#micro-container"));
    }
}

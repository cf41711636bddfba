//! CLI 应用装配层：按配置初始化全局状态、注册子应用并执行脚本命令。
use std::collections::BTreeMap;

use microhost_core::config::AppConfig;
use microhost_core::error::CliError;
use microhost_core::lifecycle::{Host, HostEvent, NavigationReport};
use microhost_core::state::{GlobalState, Subscription};
use microhost_plugins::{
    build_micro_app, install_state_logger, HostPanel, MessagePanelGuest, PanelError,
};
use tokio::sync::broadcast;

use crate::commands::script::ScriptCommand;

/// Result of one script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    /// The command was refused by the UI layer (empty message, no host, ...).
    Rejected(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Output(s) | Self::Rejected(s) => s,
        }
    }
}

pub struct HostApp {
    host: Host,
    store: GlobalState,
    panel: HostPanel,
    guests: BTreeMap<String, MessagePanelGuest>,
    _state_logger: Subscription,
}

impl HostApp {
    #[tracing::instrument(name = "cli.host_app", skip(cfg))]
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, CliError> {
        let store = GlobalState::with_options(cfg.host.store_options());
        let initial = cfg
            .host
            .initial_snapshot()
            .map_err(|e| CliError::Config(format!("invalid host.initial_state: {e}")))?;
        let actions = store.init_global_state(initial)?;
        let state_logger = install_state_logger(&actions)?;

        let mut host = Host::with_event_capacity(store.clone(), cfg.host.event_capacity);
        spawn_event_logger(host.subscribe());

        let mut apps = Vec::with_capacity(cfg.apps.len());
        let mut guests = BTreeMap::new();
        for entry in &cfg.apps {
            let built = build_micro_app(entry)?;
            if entry.render_container {
                host.add_layout(entry.active_rule(), entry.container.clone());
            }
            if let Some(panel) = built.panel {
                guests.insert(entry.name.clone(), panel);
            }
            apps.push(built.app);
        }
        host.register_micro_apps(apps)?;

        host.navigate(&cfg.host.start_path).await;
        let report = host.start().await;
        for failure in &report.failures {
            tracing::warn!(error = %failure, "initial route could not be fully mounted");
        }

        Ok(Self {
            host,
            store,
            panel: HostPanel::new(actions),
            guests,
            _state_logger: state_logger,
        })
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn store(&self) -> &GlobalState {
        &self.store
    }

    pub async fn execute(&mut self, cmd: ScriptCommand) -> Result<Outcome, CliError> {
        match cmd {
            ScriptCommand::Navigate(path) => {
                let report = self.host.navigate(&path).await;
                Ok(Outcome::Output(describe_navigation(&report)))
            }
            ScriptCommand::HostSend(text) => match self.panel.send(&text) {
                Ok(_) => Ok(Outcome::Output(format!("main-app sent {:?}", text.trim()))),
                Err(e) => rejected(e),
            },
            ScriptCommand::GuestSend { app, text } => {
                let guest = self.guest(&app)?;
                match guest.send(&text) {
                    Ok(()) => Ok(Outcome::Output(format!("{app} sent {:?}", text.trim()))),
                    Err(e) => rejected(e),
                }
            }
            ScriptCommand::View(app) => {
                let guest = self.guest(&app)?;
                let view = guest
                    .view()
                    .unwrap_or_else(|| format!("[{app}] not mounted"));
                Ok(Outcome::Output(view.trim_end().to_string()))
            }
            ScriptCommand::State => {
                let state = self.store.get_state()?;
                let json = state
                    .to_json_pretty()
                    .map_err(|e| CliError::Command(format!("failed to render state: {e}")))?;
                Ok(Outcome::Output(json))
            }
            ScriptCommand::Status => {
                let mut lines = Vec::new();
                for name in self.host.app_names() {
                    let status = self.host.status(name)?;
                    lines.push(format!("{name}: {status}"));
                }
                Ok(Outcome::Output(lines.join("\n")))
            }
        }
    }

    fn guest(&self, app: &str) -> Result<&MessagePanelGuest, CliError> {
        self.guests
            .get(app)
            .ok_or_else(|| CliError::Script(format!("no message panel registered as {app:?}")))
    }

    pub async fn shutdown(mut self) -> Result<(), CliError> {
        let report = self.host.shutdown().await;
        report.into_result()?;
        Ok(())
    }
}

fn rejected(e: PanelError) -> Result<Outcome, CliError> {
    match e {
        // 结构性错误直接向上传递
        PanelError::State(err) => Err(CliError::State(err)),
        other => Ok(Outcome::Rejected(other.to_string())),
    }
}

fn describe_navigation(report: &NavigationReport) -> String {
    let mut parts: Vec<String> = report
        .steps
        .iter()
        .map(|s| format!("{} {}", s.app, s.to))
        .collect();
    parts.extend(report.failures.iter().map(|e| format!("error: {e}")));
    if parts.is_empty() {
        format!("at {}", report.path)
    } else {
        format!("at {}: {}", report.path, parts.join(", "))
    }
}

fn spawn_event_logger(mut event_rx: broadcast::Receiver<HostEvent>) {
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(HostEvent::AppTransitioned { app, from, to, .. }) => {
                    tracing::debug!("App {} {} -> {}", app, from, to);
                }
                Ok(HostEvent::MountFailed { app, error, .. }) => {
                    tracing::error!("App {} failed to mount: {}", app, error);
                }
                Ok(HostEvent::RouteChanged { path, .. }) => {
                    tracing::debug!("Route changed: {}", path);
                }
                Ok(HostEvent::HostShutdown { .. }) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("host event logger lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lifecycle::{ActiveRule, MountDescriptor, DEFAULT_EVENT_CAPACITY};
use crate::state::{StateSnapshot, StoreOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub host: HostConfig,

    /// Registered micro apps. Defaults to the bundled `micro-app` message panel.
    #[serde(default = "default_apps")]
    pub apps: Vec<AppEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            host: HostConfig::default(),
            apps: default_apps(),
        }
    }
}

impl AppConfig {
    /// Reject configurations the host cannot register.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = std::collections::HashSet::new();
        for app in &self.apps {
            if app.name.trim().is_empty() {
                anyhow::bail!("app name must not be empty");
            }
            if !names.insert(app.name.as_str()) {
                anyhow::bail!("duplicate app name: {}", app.name);
            }
            if app.container.trim().is_empty() {
                anyhow::bail!("app {}: container must not be empty", app.name);
            }
            if !app.active_rule.starts_with('/') {
                anyhow::bail!(
                    "app {}: active_rule must be an absolute path, got {:?}",
                    app.name,
                    app.active_rule
                );
            }
        }
        if !self.host.start_path.starts_with('/') {
            anyhow::bail!("host.start_path must be an absolute path");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "microhost_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Initial global state, converted to JSON at startup.
    #[serde(default = "default_initial_state")]
    pub initial_state: toml::Table,

    /// Guests may only overwrite keys that already exist in the global state.
    #[serde(default)]
    pub restrict_guest_keys: bool,

    /// Capacity of the host lifecycle event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Route the host navigates to right after start.
    #[serde(default = "default_start_path")]
    pub start_path: String,
}

fn default_initial_state() -> toml::Table {
    let mut table = toml::Table::new();
    table.insert("user".into(), toml::Value::String("main-app user".into()));
    table.insert(
        "message".into(),
        toml::Value::String("hello from main-app".into()),
    );
    table
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_start_path() -> String {
    "/".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            initial_state: default_initial_state(),
            restrict_guest_keys: false,
            event_capacity: default_event_capacity(),
            start_path: default_start_path(),
        }
    }
}

impl HostConfig {
    pub fn initial_snapshot(&self) -> anyhow::Result<StateSnapshot> {
        let value = serde_json::to_value(&self.initial_state)?;
        Ok(StateSnapshot::from_value(value)?)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            restrict_guest_keys: self.restrict_guest_keys,
        }
    }
}

/// How `active_rule` is matched against the current path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    #[default]
    Prefix,
    Exact,
}

/// Guest implementation to instantiate for an app entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuestKind {
    #[default]
    MessagePanel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,

    /// Remote entry location, informational only.
    #[serde(default)]
    pub entry: String,

    /// Mount target selector, e.g. "#micro-container".
    pub container: String,

    pub active_rule: String,

    #[serde(default)]
    pub rule_kind: RuleKind,

    #[serde(default)]
    pub kind: GuestKind,

    /// If true, the host layout renders `container` whenever this app's route is active.
    #[serde(default = "default_render_container")]
    pub render_container: bool,

    /// Custom props passed to the guest on mount.
    #[serde(default)]
    pub props: toml::Table,
}

fn default_render_container() -> bool {
    true
}

fn default_apps() -> Vec<AppEntry> {
    vec![AppEntry {
        name: "micro-app".to_string(),
        entry: "//localhost:3001".to_string(),
        container: "#micro-container".to_string(),
        active_rule: "/micro".to_string(),
        rule_kind: RuleKind::Prefix,
        kind: GuestKind::MessagePanel,
        render_container: true,
        props: toml::Table::new(),
    }]
}

impl AppEntry {
    pub fn active_rule(&self) -> ActiveRule {
        match self.rule_kind {
            RuleKind::Prefix => ActiveRule::prefix(self.active_rule.clone()),
            RuleKind::Exact => ActiveRule::exact(self.active_rule.clone()),
        }
    }

    pub fn descriptor(&self) -> MountDescriptor {
        MountDescriptor::new(
            self.name.clone(),
            self.entry.clone(),
            self.container.clone(),
            self.active_rule(),
        )
    }

    pub fn props_json(&self) -> anyhow::Result<Map<String, Value>> {
        match serde_json::to_value(&self.props)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

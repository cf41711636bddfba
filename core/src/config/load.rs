use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Get the default microhost data directory: ~/.microhost
pub fn get_microhost_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".microhost"))
}

pub fn parse_config(s: &str) -> anyhow::Result<AppConfig> {
    let cfg = toml::from_str::<AppConfig>(s)?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.microhost/config.toml (highest)
    let data_dir = get_microhost_data_dir()?;
    let home_config = data_dir.join("config.toml");

    // Priority 2: ./microhost.toml (current directory)
    let local_config = Path::new("microhost.toml");

    let mut cfg = if home_config.exists() {
        read_config(&home_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        AppConfig::default()
    };

    // File logging defaults to the data directory when no directory is set
    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    finish(cfg)
}

/// Load an explicitly selected config file (`--config`).
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let cfg = read_config(path)?;
    finish(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    parse_config(&s).with_context(|| format!("Failed to parse config {:?}", path))
}

fn finish(mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());
    cfg.validate()?;
    Ok(cfg)
}

pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("MICROHOST_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = get("MICROHOST_RESTRICT_GUEST_KEYS") {
        cfg.host.restrict_guest_keys = matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if let Some(v) = get("MICROHOST_START_PATH") {
        cfg.host.start_path = v;
    }
}

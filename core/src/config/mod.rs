pub mod load;
pub mod types;

pub use load::{
    apply_env_overrides, get_microhost_data_dir, load_default, load_from_path, parse_config,
};
pub use types::{AppConfig, AppEntry, GuestKind, HostConfig, LoggingConfig, RuleKind};

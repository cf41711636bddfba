use clap::Parser;
use microhost_cli::app::{HostApp, Outcome};
use microhost_cli::commands::{cli, demo, script};
use microhost_core::config::AppConfig;
use microhost_core::error;
use microhost_plugins::MessagePanelGuest;
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, error::CliError> {
    let mut args = cli::Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => microhost_core::config::load_from_path(std::path::Path::new(path)),
        None => microhost_core::config::load_default(),
    }
    .map_err(|e| error::CliError::Config(format!("{e:#}")))?;
    init_tracing(&cfg.logging).map_err(error::CliError::Command)?;

    let cmd = args.command.take().unwrap_or(cli::Commands::Demo);
    dispatch(cmd, &cfg).await
}

fn exit_code_for_error(e: &error::CliError) -> i32 {
    // 0: success
    // 1: script ran but some commands were rejected
    // 11: config error
    // 12: script parse error
    // 20: lifecycle / IO error
    // 30: global state misuse
    // 50: internal/uncategorized
    match e {
        error::CliError::Config(_) => 11,
        error::CliError::Script(_) => 12,
        error::CliError::Lifecycle(_) => 20,
        error::CliError::Io(_) => 20,
        error::CliError::Command(_) => 20,
        error::CliError::State(_) => 30,
        error::CliError::Anyhow(_) => 50,
    }
}

async fn dispatch(cmd: cli::Commands, cfg: &AppConfig) -> Result<i32, error::CliError> {
    match cmd {
        cli::Commands::Demo => {
            let commands = script::parse_script(demo::DEMO_SCRIPT)?;
            run_script(cfg, commands, true).await
        }
        cli::Commands::Run(run_args) => {
            let src = match run_args.script.as_deref() {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin().read_to_string(&mut buf).await?;
                    buf
                }
            };
            let commands = script::parse_script(&src)?;
            run_script(cfg, commands, run_args.strict).await
        }
        cli::Commands::Standalone(standalone_args) => {
            let mut guest = MessagePanelGuest::new(standalone_args.name);
            let target = guest.run_standalone().await?;
            println!("{}", target.content().trim_end());
            Ok(0)
        }
    }
}

async fn run_script(
    cfg: &AppConfig,
    commands: Vec<script::ScriptCommand>,
    strict: bool,
) -> Result<i32, error::CliError> {
    let mut app = HostApp::from_config(cfg).await?;
    let mut rejected = 0usize;

    for cmd in commands {
        println!("> {}", describe_command(&cmd));
        match app.execute(cmd).await? {
            Outcome::Output(text) => println!("{text}"),
            Outcome::Rejected(reason) => {
                println!("rejected: {reason}");
                rejected += 1;
                if strict {
                    break;
                }
            }
        }
    }

    app.shutdown().await?;
    Ok(if rejected > 0 { 1 } else { 0 })
}

fn describe_command(cmd: &script::ScriptCommand) -> String {
    use script::ScriptCommand as C;
    match cmd {
        C::Navigate(path) => format!("navigate {path}"),
        C::HostSend(text) => format!("host-send {text}"),
        C::GuestSend { app, text } => format!("guest-send {app} {text}"),
        C::View(app) => format!("view {app}"),
        C::State => "state".to_string(),
        C::Status => "status".to_string(),
    }
}

fn init_tracing(logging: &microhost_core::config::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = log_directory(logging)?;
        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("microhost.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// 未配置目录时与配置加载一致，落到 ~/.microhost/logs
fn log_directory(
    logging: &microhost_core::config::LoggingConfig,
) -> Result<std::path::PathBuf, String> {
    match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(d) => Ok(std::path::PathBuf::from(d)),
        None => microhost_core::config::get_microhost_data_dir()
            .map(|d| d.join("logs"))
            .map_err(|e| format!("resolve log dir failed: {e}")),
    }
}

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "microhost", version, about = "Micro-frontend host driven through a shared global state")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of ~/.microhost/config.toml or ./microhost.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the built-in host/guest messaging walkthrough.
    Demo,
    /// Execute a host script from a file, or from stdin when no file is given.
    Run(RunArgs),
    /// Render the micro app without a host.
    Standalone(StandaloneArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Script file, one command per line.
    #[arg(long)]
    pub script: Option<String>,

    /// Stop at the first rejected command instead of reporting and continuing.
    #[arg(long)]
    pub strict: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StandaloneArgs {
    /// Name the guest renders under.
    #[arg(long, default_value = "micro-app")]
    pub name: String,
}

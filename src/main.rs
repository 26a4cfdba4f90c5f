use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use stemsplit::config::{DEFAULT_CONFIG_FILE, StemsplitConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "stemsplit")]
#[command(version, about = "Split songs into vocal and instrumental stems")]
pub struct Cli {
    /// Raise the default log level to debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to the config file. Defaults to ./stemsplit.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Separate a local file and write the stems to a directory
    Separate {
        /// Audio file to split
        input: PathBuf,

        /// Where to write the stems (defaults to the current directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default stemsplit.toml
    Init,
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn load_config(cli: &Cli, path: &Path) -> Result<StemsplitConfig> {
    if cli.config.is_some() && !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    StemsplitConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let path = config_path(&cli);

    match &cli.command {
        Commands::Serve { port, host, dev } => {
            let config = load_config(&cli, &path)?;
            cmd::cmd_serve(config, *port, host.clone(), *dev).await?;
        }
        Commands::Separate { input, out_dir } => {
            let config = load_config(&cli, &path)?;
            let out_dir = match out_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir().context("Failed to get current directory")?,
            };
            cmd::cmd_separate(config, input, &out_dir).await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&path, cli.config.is_some(), command.clone())?;
        }
    }

    Ok(())
}

//! CLI parser and dispatch.

mod check;
mod config_cmd;
mod helpers;
mod process;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docscan")]
#[command(about = "Hot-folder document scanner: OCR, structured extraction and archiving")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "DOCSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging for docscan
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the input folder and process new files until Ctrl-C
    Watch {
        /// Also process files already in the input folder at startup
        #[arg(long)]
        scan_existing: bool,
    },

    /// Run the pipeline once for the given files
    Process {
        /// Files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check external tools, configuration and remote settings
    Check,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration (after env overrides) as TOML
    Show,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = helpers::load_config(cli.config.as_deref()).await;
    let log_level = loaded
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    helpers::init_logging(cli.verbose, &log_level);

    match cli.command {
        Commands::Watch { scan_existing } => watch::cmd_watch(loaded?, scan_existing).await,
        Commands::Process { files } => process::cmd_process(loaded?, &files).await,
        Commands::Check => check::cmd_check(loaded).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&loaded?),
        },
    }
}

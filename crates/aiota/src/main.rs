//! aiota — the AiotA platform launcher.
//!
//! # Usage
//!
//! ```text
//! aiota start --config /etc/aiota/aiota.toml
//! aiota cleanlogs
//! aiota status
//! aiota --version
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use aiota_core::ProbePolicy;
use aiota_core::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "aiota",
    about = "Another Internet of Things Architecture (AiotA)",
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct Cli {
    /// Print AiotA's version
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Start the AiotA platform
    Start {
        /// Launcher settings file. Missing file means defaults.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Shared store URI, overriding [store].uri.
        #[arg(long)]
        store: Option<String>,
        /// What to do when the port check is inconclusive: abort or proceed.
        #[arg(long)]
        probe_policy: Option<ProbePolicy>,
    },
    /// [CAREFUL] Deletes all historical AiotA log files
    Cleanlogs {
        /// Log directory to clean.
        #[arg(long, default_value = commands::cleanlogs::DEFAULT_LOG_DIR)]
        log_dir: PathBuf,
    },
    /// List registered platform processes
    Status {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Shared store URI, overriding [store].uri.
        #[arg(long)]
        store: Option<String>,
    },
    /// You're staring at it
    Help,
    /// Anything unrecognised falls back to the usage text.
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if cli.version {
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let result = match cli.command {
        None | Some(Command::Help) | Some(Command::Unknown(_)) => {
            print!("{}", commands::USAGE);
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Start {
            config,
            store,
            probe_policy,
        }) => commands::start::run(&config, store.as_deref(), probe_policy).await,
        Some(Command::Cleanlogs { log_dir }) => commands::cleanlogs::run(&log_dir),
        Some(Command::Status { config, store }) => commands::status::run(&config, store.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("aiota> {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,aiota=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

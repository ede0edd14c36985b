//! pip-reroll - Headless host for the automated pip reroll watcher
//!
//! Usage:
//!   pip-reroll watch [OPTIONS]        Watch a region until the stop condition is confirmed
//!   pip-reroll capture [OPTIONS]      Save one capture of a region
//!   pip-reroll listen [OPTIONS]       Print rank updates sent to the slot display
//!   pip-reroll config show|init       Show or create the config file
//!   pip-reroll --help                 Show help

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "warn,pip_reroll=info";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        cli::print_help();
        return Ok(());
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("pip-reroll v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match cli::parse_args(&args) {
        Ok((command, options)) => {
            init_logging(options.log_file.as_deref());
            cli::run(command, options)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_help();
            std::process::exit(1);
        }
    }
}

fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Status lines go to stdout, so logs stay on stderr or in a file
    match log_file.map(File::create) {
        Some(Ok(file)) => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        other => {
            if let Some(Err(e)) = other {
                eprintln!("Warning: cannot open log file, logging to stderr: {}", e);
            }
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

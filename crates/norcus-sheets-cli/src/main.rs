//! norcus-sheets - keeps scanned sheet music in sync with its page images
//!
//! Usage:
//!   norcus-sheets                   Watch the sheets folder (default)
//!   norcus-sheets <command> [opts]  Run a single command and exit
//!   norcus-sheets --help            Show help

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod interactive;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        cli::print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("norcus-sheets {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (command, options) = match cli::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_help();
            std::process::exit(1);
        }
    };

    let (config, config_path) = cli::load_config(&options)?;
    init_logging(config.log_file.as_deref());
    tracing::debug!("Configuration loaded from {}", config_path.display());

    cli::run(command, options, config, &config_path)
}

/// Installs the global subscriber.
///
/// The level comes from `RUST_LOG` and defaults to `info`. Output goes to
/// `log_file` when set and writable, to stderr otherwise.
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    let result = match file {
        Some(file) => tracing::subscriber::set_global_default(
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish(),
        ),
        None => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).finish(),
        ),
    };
    if let Err(e) = result {
        eprintln!("Warning: logging not initialized: {}", e);
    }
}

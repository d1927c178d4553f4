//! Command line handling
//!
//! Usage:
//!   norcus-sheets [watch]                       Watch and serve the console
//!   norcus-sheets scan                          One full scan
//!   norcus-sheets deep-scan                     Scan and verify page counts
//!   norcus-sheets force-convert                 Reconvert every document
//!   norcus-sheets invalid-names [folder]        List files not in the catalog
//!   norcus-sheets fix-names [--yes]             Rename invalid files
//!   norcus-sheets init-config                   Write the default config
//!
//! Options:
//!   --config <path>    Config file instead of the default location
//!   --suggestions <n>  Suggestions per invalid file
//!   --json             Output in JSON format

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use norcus_sheets_core::{Config, ScanReport, SheetsManager, TransactionView};

use crate::interactive;

const DEFAULT_SUGGESTIONS: usize = 3;

/// CLI command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Watch,
    Scan,
    DeepScan,
    ForceConvert,
    InvalidNames {
        folder: Option<String>,
        suggestions: usize,
    },
    FixNames {
        yes: bool,
    },
    InitConfig,
}

/// CLI options
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub json: bool,
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments and return command + options
pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut command: Option<CliCommand> = None;
    let mut folder: Option<String> = None;
    let mut suggestions = DEFAULT_SUGGESTIONS;
    let mut yes = false;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--json" => options.json = true,
            "--yes" | "-y" => yes = true,
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path".to_string());
                }
                options.config = Some(PathBuf::from(&args[i]));
            }
            "--suggestions" => {
                i += 1;
                if i >= args.len() {
                    return Err("--suggestions requires a value".to_string());
                }
                suggestions = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid suggestion count: {}", args[i]))?;
            }
            "watch" if command.is_none() => command = Some(CliCommand::Watch),
            "scan" if command.is_none() => command = Some(CliCommand::Scan),
            "deep-scan" if command.is_none() => command = Some(CliCommand::DeepScan),
            "force-convert" if command.is_none() => command = Some(CliCommand::ForceConvert),
            "fix-names" if command.is_none() => {
                command = Some(CliCommand::FixNames { yes: false })
            }
            "init-config" if command.is_none() => command = Some(CliCommand::InitConfig),
            "invalid-names" if command.is_none() => {
                command = Some(CliCommand::InvalidNames {
                    folder: None,
                    suggestions,
                })
            }
            _ => {
                if arg.starts_with('-') {
                    return Err(format!("Unknown option: {}", arg));
                }
                match command {
                    Some(CliCommand::InvalidNames { .. }) if folder.is_none() => {
                        folder = Some(arg.clone())
                    }
                    Some(_) => return Err(format!("Unexpected argument: {}", arg)),
                    None => return Err(format!("Unknown command: {}", arg)),
                }
            }
        }
        i += 1;
    }

    // Apply the collected values to the command
    let command = match command {
        Some(CliCommand::InvalidNames { .. }) => CliCommand::InvalidNames {
            folder,
            suggestions,
        },
        Some(CliCommand::FixNames { .. }) => CliCommand::FixNames { yes },
        Some(cmd) => cmd,
        None => CliCommand::Watch,
    };

    Ok((command, options))
}

/// Loads the config named by `--config` or the one at the default location
pub fn load_config(options: &CliOptions) -> anyhow::Result<(Config, PathBuf)> {
    let path = match &options.config {
        Some(path) => path.clone(),
        None => Config::config_path().context("Config directory not found")?,
    };
    let config = Config::load_from(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok((config, path))
}

/// Run CLI command
pub fn run(
    command: CliCommand,
    options: CliOptions,
    config: Config,
    config_path: &Path,
) -> anyhow::Result<()> {
    if command == CliCommand::InitConfig {
        return run_init_config(config, config_path, &options);
    }

    let manager = SheetsManager::from_config(config).with_context(|| {
        format!("Invalid configuration, check {}", config_path.display())
    })?;

    match command {
        CliCommand::Watch => run_watch(&manager),
        CliCommand::Scan => print_scan(manager.full_scan(), &options),
        CliCommand::DeepScan => print_scan(manager.deep_scan(), &options),
        CliCommand::ForceConvert => print_scan(manager.force_convert_all(), &options),
        CliCommand::InvalidNames {
            folder,
            suggestions,
        } => run_invalid_names(&manager, folder.as_deref(), suggestions, &options),
        CliCommand::FixNames { yes } => run_fix_names(&manager, yes, &options),
        CliCommand::InitConfig => Ok(()),
    }
}

fn run_init_config(config: Config, path: &Path, options: &CliOptions) -> anyhow::Result<()> {
    config
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.to_string_lossy(),
                "sheets_path": config.sheets_path.as_ref().map(|p| p.to_string_lossy()),
            })
        );
    } else {
        println!("Config written to {}", path.display());
        if config.sheets_path.is_none() {
            println!("Set \"sheets_path\" to the sheets folder before starting the service.");
        }
    }
    Ok(())
}

fn run_watch(manager: &SheetsManager) -> anyhow::Result<()> {
    tracing::info!("Starting initial scan");
    if let Some(report) = manager.full_scan() {
        tracing::info!("{}: {} converted", report.mode, report.converted);
    }

    manager.start_watching()?;
    if manager.start_auto_scan()? {
        tracing::info!(
            "Auto scan every {} s",
            manager.config().auto_scan_interval_secs
        );
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = interactive::run(manager, stdin.lock(), stdout.lock());
    manager.stop();
    result
}

fn print_scan(report: Option<ScanReport>, options: &CliOptions) -> anyhow::Result<()> {
    let Some(report) = report else {
        anyhow::bail!("Another scan is already running");
    };

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "mode": report.mode.to_string(),
                "documents": report.documents,
                "converted": report.converted,
                "failed": report.failed,
                "restored": report.restored,
                "duplicates": {
                    "found": report.normalized.found,
                    "renamed": report.normalized.renamed,
                    "deleted": report.normalized.deleted,
                    "failed": report.normalized.failed,
                },
                "duration_ms": report.duration.as_millis() as u64,
            })
        );
    } else {
        println!("{} finished in {:.1?}", report.mode, report.duration);
        println!();
        println!("  Documents:  {}", report.documents);
        println!("  Converted:  {}", report.converted);
        println!("  Failed:     {}", report.failed);
        if report.restored > 0 {
            println!("  Restored:   {}", report.restored);
        }
        if report.normalized.found > 0 {
            println!(
                "  Duplicates: {} found, {} renamed, {} deleted",
                report.normalized.found, report.normalized.renamed, report.normalized.deleted
            );
        }
    }
    Ok(())
}

fn run_invalid_names(
    manager: &SheetsManager,
    folder: Option<&str>,
    suggestions: usize,
    options: &CliOptions,
) -> anyhow::Result<()> {
    let Some(views) = manager.invalid_names(folder, suggestions) else {
        anyhow::bail!("Folder {} does not exist", folder.unwrap_or_default());
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if views.is_empty() {
        println!("All file names are valid.");
    } else {
        for view in &views {
            print_view(view);
        }
        println!();
        println!("{} invalid file name(s)", views.len());
    }
    Ok(())
}

fn print_view(view: &TransactionView) {
    match &view.folder {
        Some(folder) => println!("{}/{}", folder.display(), view.invalid_file_name),
        None => println!("{}", view.invalid_file_name),
    }
    for suggestion in &view.suggestions {
        let marker = if suggestion.file_exists {
            " (FILE EXISTS!)"
        } else {
            ""
        };
        println!(
            "    -> {} [{}]{}",
            suggestion.file_name, suggestion.distance, marker
        );
    }
}

fn run_fix_names(manager: &SheetsManager, yes: bool, options: &CliOptions) -> anyhow::Result<()> {
    if !yes {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut input = stdin.lock();
        let mut output = stdout.lock();
        if !interactive::preview_and_confirm(manager, &mut input, &mut output)? {
            return Ok(());
        }
    }

    let report = manager.fix_all_names()?;
    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "renamed": report.renamed,
                "skipped": report.skipped,
                "failed": report.failed,
            })
        );
    } else {
        println!(
            "{} renamed, {} skipped, {} failed",
            report.renamed,
            report.skipped,
            report.failed.len()
        );
        for message in &report.failed {
            println!("  - {}", message);
        }
    }
    Ok(())
}

/// Reads one trimmed line; `None` at end of input
pub(crate) fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Asks a yes/no question; anything but `y` is a no
pub(crate) fn confirm(
    question: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    write!(output, "{} [Y/N] ", question)?;
    output.flush()?;
    Ok(read_line(input)?.is_some_and(|answer| answer.eq_ignore_ascii_case("y")))
}

/// Print CLI help
pub fn print_help() {
    println!("norcus-sheets {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    norcus-sheets [command] [options]");
    println!();
    println!("COMMANDS:");
    println!("    watch                       Watch the sheets folder (default)");
    println!("    scan                        Convert missing or outdated images");
    println!("    deep-scan                   Scan and verify page counts");
    println!("    force-convert               Reconvert every document");
    println!("    invalid-names [folder]      List files not named after a song");
    println!("    fix-names                   Rename invalid files to the best match");
    println!("    init-config                 Write the config file with defaults");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>             Config file to use");
    println!("    --suggestions <n>           Suggestions per invalid file (default 3)");
    println!("    --yes, -y                   Do not ask before renaming");
    println!("    --json                      Output in JSON format");
    println!("    --help, -h                  Show this help");
    println!("    --version, -V               Show the version");
    println!();
    println!("Set RUST_LOG (e.g. RUST_LOG=debug) to change the log level.");
}

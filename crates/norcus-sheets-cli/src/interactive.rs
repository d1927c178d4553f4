//! Console commands available while the service is watching

use std::io::{BufRead, Write};

use norcus_sheets_core::{ScanReport, SheetsManager};

use crate::cli::{confirm, read_line};

/// A single-letter console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    DeepScan,
    ForceConvert,
    FixNames,
    Exit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_uppercase().as_str() {
            "S" => Some(Self::Scan),
            "D" => Some(Self::DeepScan),
            "F" => Some(Self::ForceConvert),
            "N" => Some(Self::FixNames),
            "X" => Some(Self::Exit),
            _ => None,
        }
    }
}

fn print_menu(output: &mut impl Write) -> std::io::Result<()> {
    writeln!(output)?;
    writeln!(output, "Commands:")?;
    writeln!(output, "  S  Scan for missing or outdated images")?;
    writeln!(output, "  D  Deep scan (verify page counts)")?;
    writeln!(output, "  F  Force conversion of every document")?;
    writeln!(output, "  N  Fix invalid file names")?;
    writeln!(output, "  X  Exit")?;
    output.flush()
}

/// Serves console commands until `X` or end of input
pub fn run(
    manager: &SheetsManager,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    print_menu(&mut output)?;
    while let Some(line) = read_line(&mut input)? {
        if line.is_empty() {
            continue;
        }
        match ConsoleCommand::parse(&line) {
            Some(ConsoleCommand::Scan) => report_scan(manager.full_scan(), &mut output)?,
            Some(ConsoleCommand::DeepScan) => report_scan(manager.deep_scan(), &mut output)?,
            Some(ConsoleCommand::ForceConvert) => {
                if confirm(
                    "Convert every document again? This may take a long time.",
                    &mut input,
                    &mut output,
                )? {
                    report_scan(manager.force_convert_all(), &mut output)?;
                }
            }
            Some(ConsoleCommand::FixNames) => fix_names(manager, &mut input, &mut output)?,
            Some(ConsoleCommand::Exit) => break,
            None => {
                writeln!(output, "Unknown command: {}", line)?;
                print_menu(&mut output)?;
            }
        }
    }
    tracing::info!("Console closed");
    Ok(())
}

fn report_scan(report: Option<ScanReport>, output: &mut impl Write) -> std::io::Result<()> {
    match report {
        Some(report) => writeln!(
            output,
            "{} done: {} document(s), {} converted, {} failed",
            report.mode, report.documents, report.converted, report.failed
        ),
        None => writeln!(output, "A scan is already running, try again later."),
    }
}

/// Lists every invalid name with its best suggestion and asks before
/// renaming. Returns `false` if there is nothing to do or the user declined.
pub fn preview_and_confirm(
    manager: &SheetsManager,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<bool> {
    let views = manager.invalid_names(None, 1).unwrap_or_default();
    if views.is_empty() {
        writeln!(output, "All file names are valid.")?;
        return Ok(false);
    }

    for view in &views {
        let name = match &view.folder {
            Some(folder) => format!("{}/{}", folder.display(), view.invalid_file_name),
            None => view.invalid_file_name.clone(),
        };
        match view.suggestions.first() {
            Some(best) if best.file_exists => {
                writeln!(output, "{} -> {} (FILE EXISTS!)", name, best.file_name)?
            }
            Some(best) => writeln!(output, "{} -> {}", name, best.file_name)?,
            None => writeln!(output, "{} -> (no suggestion)", name)?,
        }
    }
    Ok(confirm(
        &format!("Rename {} file(s)?", views.len()),
        input,
        output,
    )?)
}

fn fix_names(
    manager: &SheetsManager,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<()> {
    if !preview_and_confirm(manager, input, output)? {
        return Ok(());
    }
    match manager.fix_all_names() {
        Ok(report) => {
            writeln!(
                output,
                "{} renamed, {} skipped, {} failed",
                report.renamed,
                report.skipped,
                report.failed.len()
            )?;
            for message in &report.failed {
                writeln!(output, "  - {}", message)?;
            }
        }
        Err(e) => writeln!(output, "Names were not fixed: {}", e)?,
    }
    Ok(())
}

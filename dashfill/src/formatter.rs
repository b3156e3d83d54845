//! Output formatters for run reports

use anyhow::Result;
use colored::*;
use dashfill_core::{Notice, NoticeScope, RunReport, Severity};
use std::collections::BTreeMap;
use std::path::Path;

/// Print the run report in human-readable format with colors and hierarchy
pub fn print_human(dir: &Path, report: &RunReport) {
    println!("{}", format!("Filling dashboard from: {}", dir.display()).bold());
    println!();

    // Group notices by round for hierarchical display
    let mut run_notices = Vec::new();
    let mut round_notices: BTreeMap<u32, Vec<&Notice>> = BTreeMap::new();
    for notice in report.sorted_notices() {
        match notice.scope.round() {
            Some(round) => round_notices.entry(round).or_default().push(notice),
            None => run_notices.push(notice),
        }
    }

    if !run_notices.is_empty() {
        println!("{}", "Run:".bold().underline());
        for notice in run_notices {
            print_notice(notice, 1);
        }
        println!();
    }

    for round in &report.rounds {
        println!(
            "{} {} {}",
            "Round".bold(),
            round.round.to_string().cyan().bold(),
            format!("({} -> '{}')", file_name(&round.source), round.year_sheet).bright_black()
        );
        for unit in &round.units {
            let mut line = format!(
                "  {} {}: {} of {} metrics written",
                "Firm".bold(),
                unit.firm.yellow(),
                unit.written(),
                unit.extracted
            );
            if !unit.unmatched.is_empty() {
                line.push_str(&format!(", {} labels without value", unit.unmatched.len()));
            }
            if !unit.unplaced.is_empty() {
                line.push_str(&format!(", {} labels without free cell", unit.unplaced.len()));
            }
            println!("{line}");
        }
        if let Some(notices) = round_notices.remove(&round.round) {
            for notice in notices {
                print_notice(notice, 1);
            }
        }
        println!();
    }

    // Rounds skipped before they produced a report
    for (round, notices) in &round_notices {
        println!("{} {}", "Round".bold(), round.to_string().cyan().bold());
        for notice in notices {
            print_notice(notice, 1);
        }
        println!();
    }

    // Print summary
    println!("{}", "Summary:".bold().underline());
    println!("  {} {}", "Cells written:".green().bold(), report.cells_written());
    match &report.output {
        Some(output) => println!("  {} {}", "Saved to:".green().bold(), output.display()),
        None => println!("  {} {}", "Saved to:".bold(), "nothing (dry run)".bright_black()),
    }
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    if errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), errors);
    }
    if warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), warnings);
    }
}

fn print_notice(notice: &Notice, indent: usize) {
    let indent_str = "  ".repeat(indent);
    let severity_str = match notice.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warning => "WARN".yellow().bold(),
        Severity::Info => "INFO".blue().bold(),
    };

    match &notice.scope {
        NoticeScope::Firm(_, firm) => println!(
            "{}{} [{}] {}",
            indent_str,
            severity_str,
            format!("firm {firm}").bright_black(),
            notice.message
        ),
        _ => println!("{}{} {}", indent_str, severity_str, notice.message),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print the run report in JSON format
pub fn print_json(dir: &Path, report: &RunReport) -> Result<()> {
    let output = serde_json::json!({
        "dir": dir.display().to_string(),
        "output": report.output.as_ref().map(|p| p.display().to_string()),
        "rounds": report.rounds,
        "notices": report.sorted_notices(),
        "summary": {
            "cells_written": report.cells_written(),
            "errors": report.count(Severity::Error),
            "warnings": report.count(Severity::Warning),
            "info": report.count(Severity::Info),
        }
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

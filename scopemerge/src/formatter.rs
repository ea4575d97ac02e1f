//! Output formatters for run reports

use anyhow::Result;
use colored::*;
use scopemerge_core::report::{Destination, RunReport};
use scopemerge_core::RunPaths;
use std::collections::BTreeMap;

/// Print the report in human-readable format with colors, grouped by entity
pub fn print_human(paths: &RunPaths, report: &RunReport) {
    println!("{}", format!("Summary: {}", paths.summary_file.display()).bold());
    println!();

    // Group written cells and mismatches by entity
    let mut written: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for cell in &report.written {
        written.entry(cell.entity.as_str()).or_default().push(cell);
    }
    let mut mismatches: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for record in &report.mismatches {
        mismatches.entry(record.entity.as_str()).or_default().push(record);
    }

    for (entity, sheet) in &report.processed {
        println!("{} {} -> {}", "Entity:".bold(), entity.cyan().bold(), sheet.cyan());

        for cell in written.get(entity.as_str()).into_iter().flatten() {
            let mut note = String::new();
            if let Destination::SpecialCase { id, name } = &cell.destination {
                note.push_str(&format!(" [special case {}: {}]", id, name));
            }
            if cell.placeholder {
                note.push_str(" [placeholder]");
            }
            println!(
                "  {} {} = {}{}",
                cell.cell.to_string().yellow(),
                cell.label,
                cell.value,
                note.bright_black()
            );
        }

        for record in mismatches.get(entity.as_str()).into_iter().flatten() {
            println!(
                "  {} {} ({}): {}",
                "MISS".red().bold(),
                record.label,
                record.scope,
                record.reason
            );
        }
        println!();
    }

    if !report.ambiguous.is_empty() {
        println!("{}", "Ambiguous labels (not written):".bold().underline());
        for item in &report.ambiguous {
            let candidates: Vec<String> = item.candidates.iter().map(|c| c.to_string()).collect();
            println!(
                "  {} {} / {} '{}' in {}: {}",
                "WARN".yellow().bold(),
                item.entity,
                item.scope,
                item.label,
                item.sheet,
                candidates.join(", ")
            );
        }
        println!();
    }

    if !report.unmatched.is_empty() || !report.skipped.is_empty() {
        println!("{}", "Entities not written:".bold().underline());
        for entity in &report.unmatched {
            println!("  {} {}: no summary sheet", "WARN".yellow().bold(), entity);
        }
        for skipped in &report.skipped {
            println!("  {} {}: {}", "ERROR".red().bold(), skipped.entity, skipped.reason);
        }
        println!();
    }

    // Print summary
    println!("{}", "Summary:".bold().underline());
    println!("  {} {}", "Entities:".bold(), report.processed.len());
    println!("  {} {}", "Cells written:".green().bold(), report.written.len());
    if report.placeholder_count() > 0 {
        println!("  {} {}", "Placeholders:".blue().bold(), report.placeholder_count());
    }
    if !report.mismatches.is_empty() {
        println!("  {} {}", "Mismatches:".red().bold(), report.mismatches.len());
    }
    if !report.ambiguous.is_empty() {
        println!("  {} {}", "Ambiguous:".yellow().bold(), report.ambiguous.len());
    }

    match &report.output {
        Some(output) => println!("  {} {}", "Saved:".bold(), output.display()),
        None => println!("  {}", "Dry run, nothing saved".bright_black()),
    }

    if report.is_clean() {
        println!("{}", "✓ Every label was placed!".green().bold());
    }
}

/// Print the report in JSON format
pub fn print_json(paths: &RunPaths, report: &RunReport) -> Result<()> {
    let output = serde_json::json!({
        "summary_file": paths.summary_file.display().to_string(),
        "report": report,
        "summary": {
            "entities": report.processed.len(),
            "written": report.written.len(),
            "placeholders": report.placeholder_count(),
            "mismatches": report.mismatches.len(),
            "ambiguous": report.ambiguous.len(),
            "skipped": report.skipped.len() + report.unmatched.len(),
        }
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

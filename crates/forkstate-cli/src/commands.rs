use anyhow::Result;
use colored::Colorize;
use forkstate_core::{RootConfig, SlotMerge};
use forkstate_types::Resolution;
use serde_json::Value;

use crate::cli::{Cli, Command, MergeArgs, OutputFormat, QueensArgs};
use crate::explore::{merge_values, parse_value};
use crate::search::solve_queens;

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RootConfig::load(path)?,
        None => RootConfig::default(),
    };
    match cli.command {
        Command::Queens(args) => cmd_queens(args, config, cli.format),
        Command::Merge(args) => cmd_merge(args, config, cli.format),
    }
}

fn cmd_queens(args: QueensArgs, config: RootConfig, format: OutputFormat) -> Result<()> {
    let placement = solve_queens(args.size, config)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&placement)?);
        return Ok(());
    }

    let Some(placement) = placement else {
        println!("{} no placement exists for {} queens", "✗".red().bold(), args.size);
        return Ok(());
    };
    println!(
        "{} placed {} queens after {} attempts",
        "✓".green().bold(),
        args.size,
        placement.attempts
    );
    println!();
    for column in &placement.columns {
        let row: String = (0..args.size)
            .map(|c| if c == *column { "Q " } else { ". " })
            .collect();
        println!("  {}", row.trim_end());
    }
    Ok(())
}

fn cmd_merge(args: MergeArgs, config: RootConfig, format: OutputFormat) -> Result<()> {
    let values: Vec<Value> = args.values.iter().map(|v| parse_value(v)).collect();
    let outcome = merge_values(&values, args.unknown, args.or_none, config)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let branches = values.len() + usize::from(args.unknown);
    println!(
        "{} {} branches {}",
        "Merged".bold(),
        branches,
        if args.or_none { "(or-none)".dimmed() } else { "(strict)".dimmed() }
    );
    for (slot, merge) in outcome.report.outcomes() {
        let label = match merge {
            SlotMerge::Agreed { .. } => "agreed".green(),
            SlotMerge::Unknown { .. } => "unknown".yellow(),
            SlotMerge::Conflicted { .. } => "conflict".red(),
        };
        println!("  {:<10} {}", slot.to_string().cyan(), label);
    }

    match &outcome.resolution {
        Resolution::Value(v) => println!("{} {}", "value:".green().bold(), v),
        Resolution::Unknown => println!("{} not known", "value:".yellow().bold()),
        Resolution::Conflict(conflict) => {
            println!("{} ambiguous between {} candidates", "value:".red().bold(), conflict.len());
            for (i, v) in conflict.possibilities().iter().enumerate() {
                let position = conflict
                    .positions
                    .get(i)
                    .and_then(Option::as_ref)
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default();
                println!("  {} {}{}", "-".dimmed(), v, position.dimmed());
            }
            if conflict.includes_unknown {
                println!("  {} {}", "-".dimmed(), "not known".yellow());
            }
        }
    }
    Ok(())
}

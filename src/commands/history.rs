use chrono::NaiveDate;
use colored::*;
use eyre::{Context, Result};

use crate::cli::{HistoryAction, OutputFormat};
use crate::config::Config;
use crate::memory::history::TurnLog;
use crate::memory::{HISTORY_FILE, Turn};

pub fn run(action: HistoryAction, config: &Config) -> Result<()> {
    let log = TurnLog::new(config.memory_dir().join(HISTORY_FILE));

    match action {
        HistoryAction::Recent { count, format } => recent(&log, count, OutputFormat::resolve(format)),
        HistoryAction::Query {
            query,
            limit,
            since,
            format,
        } => query_history(&log, &query, limit, since.as_deref(), OutputFormat::resolve(format)),
    }
}

fn recent(log: &TurnLog, count: usize, format: OutputFormat) -> Result<()> {
    let turns = log.recent(count)?;

    if format != OutputFormat::Text {
        return print_structured(&turns, format);
    }

    println!("{} Recent turns from {}:", "📋".blue(), log.path().display());
    println!();

    if turns.is_empty() {
        println!("  {}", "(no history yet)".dimmed());
    } else {
        for turn in &turns {
            print_turn(turn);
        }
    }

    Ok(())
}

fn query_history(log: &TurnLog, query: &str, limit: usize, since: Option<&str>, format: OutputFormat) -> Result<()> {
    let since_date = since
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("Invalid date format (use YYYY-MM-DD)")?;

    let turns = log.query(query, since_date, limit)?;

    if format != OutputFormat::Text {
        return print_structured(&turns, format);
    }

    println!(
        "{} Found {} turns matching '{}':",
        "🔍".blue(),
        turns.len(),
        query.cyan()
    );
    println!();

    if turns.is_empty() {
        println!("  {}", "(no matches)".dimmed());
    } else {
        for turn in &turns {
            print_turn(turn);
        }
    }

    Ok(())
}

fn print_structured(turns: &[Turn], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(turns)?),
        _ => println!("{}", serde_json::to_string_pretty(turns)?),
    }
    Ok(())
}

fn print_turn(turn: &Turn) {
    // local time, matching how `--since` compares dates
    let date = turn
        .timestamp
        .map(|ts| ts.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!("  {} {}", date.dimmed(), turn.id.dimmed());
    println!("    {} {}", "You:".cyan(), turn.user);
    println!("    {} {}", "Bot:".green(), turn.bot);
}

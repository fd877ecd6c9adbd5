use colored::*;
use eyre::{Context, Result};
use serde::Serialize;

use crate::cli::{MemoryAction, OutputFormat};
use crate::config::Config;
use crate::memory::{MemoryStats, Retrieved};
use crate::ollama::OllamaClient;

pub fn run(action: MemoryAction, config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.ollama);
    let mut memory = super::open_memory(config, &client)?;

    match action {
        MemoryAction::Search { text, top_k, format } => {
            let results = memory
                .search(&text, top_k, config.memory.min_similarity)
                .context("Memory search failed (run `localchat doctor` to check Ollama)")?;
            search_output(&text, &results, OutputFormat::resolve(format))
        }
        MemoryAction::Stats { format } => {
            let stats = memory.stats();
            stats_output(&stats, &memory.dir().display().to_string(), OutputFormat::resolve(format))
        }
        MemoryAction::Rebuild { all } => {
            let stats = memory.stats();
            if all {
                println!(
                    "{} Re-embedding {} turns with {}",
                    "→".blue(),
                    stats.turns,
                    config.ollama.embedding_model.cyan()
                );
            } else if stats.missing == 0 {
                println!("{} Every turn is already indexed", "✓".green());
                return Ok(());
            } else {
                println!("{} Embedding {} unindexed turns", "→".blue(), stats.missing);
            }

            let report = memory.rebuild(all)?;
            if report.failed == 0 {
                println!("  {} Embedded {} turns", "✓".green(), report.embedded);
            } else {
                println!(
                    "  {} Embedded {} turns, {} failed (is Ollama running?)",
                    "⚠".yellow(),
                    report.embedded,
                    report.failed
                );
            }
            Ok(())
        }
        MemoryAction::Clear { force } => {
            if !force {
                eyre::bail!(
                    "Refusing to clear {} turns without --force",
                    memory.turns().len()
                );
            }
            memory.clear()?;
            println!("{} Cleared memory at {}", "✓".green(), memory.dir().display());
            Ok(())
        }
    }
}

fn search_output(text: &str, results: &[Retrieved], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(results)?),
        OutputFormat::Text => {
            println!("{} Memories closest to '{}':", "🔍".blue(), text.cyan());
            println!();

            if results.is_empty() {
                println!("  {}", "(no matches)".dimmed());
            }
            for item in results {
                println!("  {} {}", format!("{:.3}", item.score).yellow(), item.turn.id.dimmed());
                println!("    {} {}", "You:".cyan(), item.turn.user);
                println!("    {} {}", "Bot:".green(), item.turn.bot);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct StatsReport<'a> {
    dir: &'a str,
    #[serde(flatten)]
    stats: &'a MemoryStats,
}

fn stats_output(stats: &MemoryStats, dir: &str, format: OutputFormat) -> Result<()> {
    let report = StatsReport { dir, stats };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Text => {
            println!("{}", "Memory".bold());
            println!("  dir:       {}", dir);
            println!("  turns:     {}", stats.turns);
            println!("  indexed:   {}", stats.indexed);
            match stats.dimension {
                Some(d) => println!("  dimension: {}", d),
                None => println!("  dimension: {}", "-".dimmed()),
            }

            if stats.missing > 0 {
                println!(
                    "  {} {} turns have no embedding; run {}",
                    "⚠".yellow(),
                    stats.missing,
                    "localchat memory rebuild".cyan()
                );
            }
            if stats.orphaned > 0 {
                println!(
                    "  {} {} vectors have no matching turn; run {}",
                    "⚠".yellow(),
                    stats.orphaned,
                    "localchat memory rebuild --all".cyan()
                );
            }
        }
    }
    Ok(())
}

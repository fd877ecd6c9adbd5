//! Diagnose localchat setup issues

use colored::*;
use eyre::Result;

use crate::config::Config;
use crate::memory::{HISTORY_FILE, VECTORS_FILE};
use crate::ollama::{OllamaClient, has_model};

pub fn run(config: &Config) -> Result<()> {
    println!("{}", "localchat doctor".bold());
    println!("{}", "═".repeat(50));
    println!();

    let mut issues = 0;

    // Config file
    let config_file = Config::config_file();
    if config_file.exists() {
        println!("{} Config file: {}", "✓".green(), config_file.display());
    } else {
        println!(
            "{} No config file at {} (using defaults)",
            "⚠".yellow(),
            config_file.display()
        );
    }

    // Memory directory
    let memory_dir = config.memory_dir();
    if memory_dir.exists() {
        println!("{} Memory directory: {}", "✓".green(), memory_dir.display());
        for file in [HISTORY_FILE, VECTORS_FILE] {
            let path = memory_dir.join(file);
            if path.exists() {
                println!("  {} {}", "✓".green(), file);
            } else {
                println!("  {} {} (created on first turn)", "⚠".yellow(), file);
            }
        }
    } else {
        println!(
            "{} Memory directory missing: {} (created on first chat)",
            "⚠".yellow(),
            memory_dir.display()
        );
    }

    println!();

    // Ollama server
    println!("{}", "Ollama:".bold());
    let client = OllamaClient::new(&config.ollama);
    match client.list_models() {
        Ok(models) => {
            println!("  {} Server reachable at {}", "✓".green(), client.base_url());

            for (role, model) in [
                ("generation", &config.ollama.generation_model),
                ("embedding", &config.ollama.embedding_model),
            ] {
                if has_model(&models, model) {
                    println!("  {} {} model: {}", "✓".green(), role, model);
                } else {
                    println!("  {} {} model not installed: {}", "✗".red(), role, model);
                    println!("    Run {} to install it", format!("ollama pull {}", model).cyan());
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  {} Cannot reach {}: {}", "✗".red(), client.base_url(), e);
            println!("    Is {} running?", "ollama serve".cyan());
            issues += 1;
        }
    }

    println!();

    if issues == 0 {
        println!("{} No issues found", "✓".green());
    } else {
        println!("{} {} issue(s) found", "✗".red(), issues);
    }

    Ok(())
}

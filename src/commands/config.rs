use colored::*;
use eyre::{Context, Result};
use std::fs;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::{Config, LogLevel};

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => get(&key, config),
        ConfigAction::Set { key, value } => set(&key, &value, config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "localchat configuration".bold());
            println!();

            println!("{}:", "ollama".cyan());
            println!("  base_url: {}", config.ollama.base_url);
            println!("  generation_model: {}", config.ollama.generation_model);
            println!("  embedding_model: {}", config.ollama.embedding_model);
            println!("  timeout_secs: {}", config.ollama.timeout_secs);
            println!();

            println!("{}:", "memory".cyan());
            println!("  dir: {}", config.memory.dir.display());
            println!("  top_k: {}", config.memory.top_k);
            if let Some(min) = config.memory.min_similarity {
                println!("  min_similarity: {}", min);
            }
            println!();

            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
        }
    }

    Ok(())
}

/// Value of a dotted key, `None` if the key is unknown
pub fn lookup(key: &str, config: &Config) -> Option<String> {
    let value = match key {
        "ollama.base_url" => config.ollama.base_url.clone(),
        "ollama.generation_model" => config.ollama.generation_model.clone(),
        "ollama.embedding_model" => config.ollama.embedding_model.clone(),
        "ollama.timeout_secs" => config.ollama.timeout_secs.to_string(),
        "ollama.temperature" => config.ollama.temperature.map(|t| t.to_string()).unwrap_or_default(),
        "ollama.num_predict" => config.ollama.num_predict.map(|n| n.to_string()).unwrap_or_default(),
        "memory.dir" => config.memory.dir.display().to_string(),
        "memory.top_k" => config.memory.top_k.to_string(),
        "memory.min_similarity" => config.memory.min_similarity.map(|m| m.to_string()).unwrap_or_default(),
        "chat.system_prompt" => config.chat.system_prompt.clone(),
        "chat.fallback_reply" => config.chat.fallback_reply.clone(),
        "log_level" | "log-level" => config.log_level.as_filter().to_string(),
        _ => return None,
    };
    Some(value)
}

/// Apply a dotted key assignment; an empty value unsets optional keys
pub fn apply(key: &str, value: &str, config: &mut Config) -> Result<()> {
    match key {
        "ollama.base_url" => config.ollama.base_url = value.to_string(),
        "ollama.generation_model" => config.ollama.generation_model = value.to_string(),
        "ollama.embedding_model" => config.ollama.embedding_model = value.to_string(),
        "ollama.timeout_secs" => {
            config.ollama.timeout_secs = value.parse().context("Invalid number of seconds")?;
        }
        "ollama.temperature" => {
            config.ollama.temperature = parse_optional(value).context("Invalid temperature")?;
        }
        "ollama.num_predict" => {
            config.ollama.num_predict = parse_optional(value).context("Invalid token count")?;
        }
        "memory.dir" => config.memory.dir = value.into(),
        "memory.top_k" => {
            config.memory.top_k = value.parse().context("Invalid top_k (use a whole number)")?;
        }
        "memory.min_similarity" => {
            config.memory.min_similarity = parse_optional(value).context("Invalid similarity threshold")?;
        }
        "chat.system_prompt" => config.chat.system_prompt = value.to_string(),
        "chat.fallback_reply" => config.chat.fallback_reply = value.to_string(),
        "log_level" | "log-level" => config.log_level = value.parse::<LogLevel>()?,
        _ => {
            eyre::bail!("Unknown config key: {}", key);
        }
    }
    Ok(())
}

fn parse_optional<T: std::str::FromStr>(value: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value.parse::<T>()?))
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => {
            eprintln!("{} Unknown config key: {}", "✗".red(), key);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn set(key: &str, value: &str, config: &Config) -> Result<()> {
    println!("{} Setting {} = {}", "→".blue(), key.cyan(), value.green());

    let mut new_config = config.clone();
    apply(key, value, &mut new_config)?;

    let config_path = Config::config_file();
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml_str = serde_yaml::to_string(&new_config).context("Failed to serialize config")?;
    fs::write(&config_path, yaml_str).context("Failed to write config file")?;

    println!("  {} Saved to {}", "✓".green(), config_path.display());

    Ok(())
}

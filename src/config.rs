use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::prompt::DEFAULT_SYSTEM_PROMPT;

/// Main localchat configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub memory: MemoryConfig,
    pub chat: ChatConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    pub base_url: String,
    /// Model used for replies (`/api/generate`)
    pub generation_model: String,
    /// Model used for embeddings (`/api/embeddings`)
    pub embedding_model: String,
    /// Global request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature passed through as a model option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Max tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding history.jsonl and vectors.jsonl
    pub dir: PathBuf,
    /// Number of past turns injected into each prompt
    pub top_k: usize,
    /// Hits scoring below this cosine similarity are dropped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// Reply shown when generation fails or comes back empty
    pub fallback_reply: String,
    /// Inputs that end the session (case-insensitive)
    pub exit_commands: Vec<String>,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" => Ok(LogLevel::Off),
            other => eyre::bail!("Invalid log level: {}", other),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generation_model: "gemma2:2b".to_string(),
            embedding_model: "mxbai-embed-large:335m-v1-fp16".to_string(),
            timeout_secs: 120,
            temperature: None,
            num_predict: None,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: Config::localchat_dir().join("memory"),
            top_k: 3,
            min_similarity: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_reply: "I'm sorry, I had trouble generating a response. Could you try rephrasing?".to_string(),
            exit_commands: vec!["quit".to_string(), "exit".to_string()],
        }
    }
}

impl ChatConfig {
    /// Whether the input ends the session
    pub fn is_exit_command(&self, input: &str) -> bool {
        self.exit_commands.iter().any(|c| c.eq_ignore_ascii_case(input))
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check LOCALCHAT_CONFIG env var
        if let Ok(env_path) = std::env::var("LOCALCHAT_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from LOCALCHAT_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try LOCALCHAT_DIR/localchat.yaml
        if let Ok(dir) = std::env::var("LOCALCHAT_DIR") {
            let path = PathBuf::from(dir).join("localchat.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from LOCALCHAT_DIR: {}", e);
                    }
                }
            }
        }

        // Try ~/.config/localchat/localchat.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("localchat").join("localchat.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./localchat.yaml (for development)
        let local_config = PathBuf::from("localchat.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Get the localchat directory (config file and default memory location)
    pub fn localchat_dir() -> PathBuf {
        std::env::var("LOCALCHAT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("localchat"))
    }

    /// Path `config set` writes to
    pub fn config_file() -> PathBuf {
        Self::localchat_dir().join("localchat.yaml")
    }

    /// Memory directory with `~` and env vars expanded
    pub fn memory_dir(&self) -> PathBuf {
        Self::expand_path(&self.memory.dir)
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "localchat",
    about = "Console chatbot that remembers past conversations, backed by a local Ollama server",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/localchat/logs/localchat.log\n\nRuns an interactive chat when no command is given."
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to localchat.yaml config file")]
    pub config: Option<PathBuf>,

    /// Show retrieved memories alongside replies
    #[arg(short, long, global = true, help = "Show retrieved memories alongside replies")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,

    /// Ask a single question and print the reply
    Ask {
        /// The message to send
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,

        /// Don't record this exchange in memory
        #[arg(long)]
        no_save: bool,
    },

    /// Browse the conversation log
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Inspect and maintain the vector memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose setup issues
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Show recent turns
    Recent {
        /// Number of turns
        #[arg(long, default_value = "5")]
        count: usize,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Search the log
    Query {
        /// Search query (regex)
        query: String,

        /// Max results
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only turns on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },
}

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Find the turns most similar to some text
    Search {
        /// Text to search for
        text: String,

        /// Number of results
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show log and index counts
    Stats {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Embed turns missing from the index
    Rebuild {
        /// Re-embed every turn (after changing the embedding model)
        #[arg(long)]
        all: bool,
    },

    /// Delete the conversation log and vector index
    Clear {
        /// Required; clearing cannot be undone
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (dot notation)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// New value
        value: String,
    },
}

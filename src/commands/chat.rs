use eyre::Result;
use std::io;

use crate::chat::{ChatSession, ChatSettings};
use crate::config::Config;
use crate::ollama::OllamaClient;

pub fn run(verbose: bool, config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.ollama);
    let mut memory = super::open_memory(config, &client)?;

    log::info!(
        "Chat session starting (model={}, embeddings={}, top_k={})",
        config.ollama.generation_model,
        config.ollama.embedding_model,
        config.memory.top_k
    );

    let settings = ChatSettings::from_config(config, verbose);
    let mut session = ChatSession::new(&client, &mut memory, settings);

    let stdin = io::stdin();
    session.run(stdin.lock(), io::stdout())
}

pub mod ask;
pub mod chat;
pub mod completions;
pub mod config;
pub mod doctor;
pub mod history;
pub mod memory;

use eyre::Result;

use crate::config::Config;
use crate::memory::Memory;
use crate::ollama::OllamaClient;

/// Open the configured memory, embedding through `client`
pub fn open_memory<'a>(config: &Config, client: &'a OllamaClient) -> Result<Memory<&'a OllamaClient>> {
    Memory::open(&config.memory_dir(), client)
}

use colored::*;
use eyre::Result;
use std::io;

use crate::chat::{ChatSession, ChatSettings, print_context};
use crate::config::Config;
use crate::ollama::OllamaClient;

pub fn run(prompt: &[String], no_save: bool, verbose: bool, config: &Config) -> Result<()> {
    let message = prompt.join(" ");
    let message = message.trim();
    if message.is_empty() {
        eyre::bail!("Nothing to ask");
    }

    let client = OllamaClient::new(&config.ollama);
    let mut memory = super::open_memory(config, &client)?;

    let settings = ChatSettings::from_config(config, verbose);
    let mut session = ChatSession::new(&client, &mut memory, settings);
    let reply = session.respond(message, !no_save);

    if verbose {
        print_context(&mut io::stdout(), &reply.context)?;
    }
    println!("{}", reply.text);

    if !no_save && reply.saved.is_none() {
        eprintln!("{} This exchange was not saved to memory", "⚠".yellow());
    }

    Ok(())
}

//! Chat session: retrieve, prompt, generate, remember

use colored::*;
use eyre::{Context, Result};
use std::io::{BufRead, Write};

use crate::config::{ChatConfig, Config};
use crate::memory::{Memory, Retrieved, Turn};
use crate::ollama::{Embedder, Generator};
use crate::prompt::{build_prompt, format_context};

/// Per-session knobs pulled from config and CLI flags
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub chat: ChatConfig,
    pub top_k: usize,
    pub min_similarity: Option<f32>,
    pub verbose: bool,
}

impl ChatSettings {
    pub fn from_config(config: &Config, verbose: bool) -> Self {
        Self {
            chat: config.chat.clone(),
            top_k: config.memory.top_k,
            min_similarity: config.memory.min_similarity,
            verbose,
        }
    }
}

/// Outcome of one user message
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub context: Vec<Retrieved>,
    /// The recorded turn, `None` when not saved
    pub saved: Option<Turn>,
}

pub struct ChatSession<'a, G, E> {
    generator: G,
    memory: &'a mut Memory<E>,
    settings: ChatSettings,
}

impl<'a, G: Generator, E: Embedder> ChatSession<'a, G, E> {
    pub fn new(generator: G, memory: &'a mut Memory<E>, settings: ChatSettings) -> Self {
        Self {
            generator,
            memory,
            settings,
        }
    }

    /// Answer one message, recording the turn when `save` is set
    ///
    /// Failed or empty generations get the fallback reply and are never saved.
    pub fn respond(&mut self, input: &str, save: bool) -> Reply {
        let context = self
            .memory
            .retrieve(input, self.settings.top_k, self.settings.min_similarity);
        log::debug!("Retrieved {} snippets for prompt", context.len());

        let context_block = format_context(context.iter().map(|r| &r.turn));
        let prompt = build_prompt(&self.settings.chat.system_prompt, &context_block, input);
        log::trace!("Prompt sent to model:\n{}", prompt);

        let generated = match self.generator.generate(&prompt) {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => {
                log::warn!("Model returned an empty reply");
                None
            }
            Err(e) => {
                log::error!("Generation failed: {:#}", e);
                None
            }
        };

        let Some(text) = generated else {
            return Reply {
                text: self.settings.chat.fallback_reply.clone(),
                context,
                saved: None,
            };
        };

        let saved = if save {
            match self.memory.record(input, &text) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    log::warn!("Failed to save turn: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Reply { text, context, saved }
    }

    /// Interactive loop until an exit command or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> Result<()> {
        writeln!(out, "{}", "Starting LocalChat...".bold())?;
        writeln!(out, "This bot remembers conversations across sessions.")?;
        writeln!(
            out,
            "Type {} to end the conversation.",
            self.settings
                .chat
                .exit_commands
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(" or ")
        )?;

        let mut line = String::new();
        loop {
            write!(out, "{} ", "You:".cyan().bold())?;
            out.flush()?;

            line.clear();
            let read = input.read_line(&mut line).context("Failed to read input")?;
            if read == 0 {
                writeln!(out)?;
                break;
            }

            let message = line.trim();
            if message.is_empty() {
                continue;
            }

            if self.settings.chat.is_exit_command(message) {
                writeln!(out, "{} Goodbye! Your conversation has been saved.", "Bot:".green().bold())?;
                break;
            }

            let reply = self.respond(message, true);

            if self.settings.verbose {
                print_context(&mut out, &reply.context)?;
            }
            writeln!(out, "{} {}", "Bot:".green().bold(), reply.text)?;
        }

        writeln!(out, "Chat session ended.")?;
        log::info!("Chat session ended");
        Ok(())
    }
}

pub fn print_context<W: Write>(out: &mut W, context: &[Retrieved]) -> Result<()> {
    if context.is_empty() {
        writeln!(out, "  {}", "(no relevant memories)".dimmed())?;
        return Ok(());
    }
    for item in context {
        writeln!(
            out,
            "  {} {}",
            format!("[{:.3}]", item.score).dimmed(),
            item.turn.user.italic()
        )?;
    }
    Ok(())
}

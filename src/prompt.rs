//! Prompt assembly
//!
//! The model sees the system instruction, then any retrieved snippets (most
//! relevant first), then the current user message with an open `Bot:` cue.

use crate::memory::Turn;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and friendly conversational AI. \
Your goal is to assist the user based on the current conversation and any relevant past snippets provided. \
If past snippets are given, use them to remember details like names, preferences, or previous topics. \
If no relevant past snippets are provided, or if they don't seem relevant to the current question, \
answer based on the current question alone.";

const CONTEXT_HEADER: &str = "Relevant past conversation snippets (most relevant first):\n---\n";

/// Render retrieved turns as a context block, empty when there are none
pub fn format_context<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    let mut context = String::new();
    for turn in turns {
        if context.is_empty() {
            context.push_str(CONTEXT_HEADER);
        }
        context.push_str(&format!("User: {}\nBot: {}\n---\n", turn.user, turn.bot));
    }
    context
}

pub fn build_prompt(system_prompt: &str, context: &str, user_input: &str) -> String {
    let mut prompt = format!("{}\n\n", system_prompt);
    if !context.is_empty() {
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str(&format!("Current conversation:\nUser: {}\nBot:", user_input));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, bot: &str) -> Turn {
        Turn {
            id: "turn_0_00000000".to_string(),
            user: user.to_string(),
            bot: bot.to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(std::iter::empty()), "");
    }

    #[test]
    fn test_format_context_keeps_order() {
        let turns = [turn("My name is Alex.", "Nice to meet you, Alex!"), turn("Hi", "Hello")];
        let context = format_context(&turns);

        assert_eq!(
            context,
            "Relevant past conversation snippets (most relevant first):\n---\n\
             User: My name is Alex.\nBot: Nice to meet you, Alex!\n---\n\
             User: Hi\nBot: Hello\n---\n"
        );
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = build_prompt("SYSTEM", "", "Why is the sky blue?");
        assert_eq!(prompt, "SYSTEM\n\nCurrent conversation:\nUser: Why is the sky blue?\nBot:");
    }

    #[test]
    fn test_build_prompt_with_context() {
        let context = format_context(&[turn("My name is Alex.", "Hi Alex!")]);
        let prompt = build_prompt("SYSTEM", &context, "What is my name?");

        assert!(prompt.starts_with("SYSTEM\n\nRelevant past conversation snippets"));
        assert!(prompt.contains("---\n\nCurrent conversation:\nUser: What is my name?\nBot:"));
        assert!(prompt.ends_with("Bot:"));
    }

    #[test]
    fn test_default_system_prompt_mentions_snippets() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("past snippets"));
        assert!(!DEFAULT_SYSTEM_PROMPT.contains("  "));
    }
}

//! Prompt text shared by the remote backends.

use crate::context::ContextSnippet;
use crate::query::Query;

pub const PERSONA: &str = "You are a helpful assistant for CivicBridge AI.";

pub const INSTRUCTION: &str = "Please answer the query based on the context provided. \
Keep the answer concise and helpful for a rural user.";

/// Single-message prompt: persona, quoted query, context, instruction.
pub fn build_prompt(query: &Query, context: &ContextSnippet) -> String {
    format!(
        "{PERSONA} User Query: \"{}\"\nContext Information:\n{}\n{INSTRUCTION}{}",
        query.text(),
        context.render(),
        language_hint(query)
    )
}

/// System message for chat-style backends. The query goes in its own
/// user message.
pub fn system_prompt(query: &Query, context: &ContextSnippet) -> String {
    format!(
        "{PERSONA}\nContext Information:\n{}\n{INSTRUCTION}{}",
        context.render(),
        language_hint(query)
    )
}

fn language_hint(query: &Query) -> String {
    format!(" Respond in the language with tag \"{}\".", query.language_tag())
}

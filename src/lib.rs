//! MinutAI library exports

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod core;
pub mod inference;
pub mod pipeline;
pub mod server;

#[cfg(test)]
pub mod test_support;

/// The LLM services a summary can be requested from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Anthropic, ProviderId::OpenAi, ProviderId::Gemini];

    /// Human-readable service name, used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            ProviderId::Anthropic => "Anthropic",
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAi => "openai",
            ProviderId::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

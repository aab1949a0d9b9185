//! Prompt construction and request validation.
//!
//! Two kinds of input are supported: a meeting transcript, and raw notes
//! scribbled during a meeting. Each gets its own system prompt; both demand
//! the same JSON document back.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Shortest (trimmed) input worth sending to a model.
pub const MIN_TEXT_LEN: usize = 10;

const JSON_SCHEMA: &str = r#"
Return this exact JSON structure, with no markdown and no code blocks, just raw JSON:
{
  "summary": "2-4 paragraph executive summary of the meeting",
  "actionItems": [
    {
      "task": "Clear description of what needs to be done",
      "owner": "Name or 'Unassigned' if not specified",
      "deadline": "Date/timeframe or 'No deadline set'",
      "priority": "high|medium|low"
    }
  ],
  "decisions": [
    {
      "decision": "What was decided",
      "rationale": "Why this decision was made (brief)",
      "madeBy": "Who decided or 'Group decision'"
    }
  ],
  "participants": ["Name1", "Name2"],
  "meetingType": "e.g. Sprint Planning, Client Review, Team Standup, etc.",
  "keyTopics": ["topic1", "topic2", "topic3"]
}"#;

const TRANSCRIPT_PREAMBLE: &str = "You are an expert meeting analyst. Analyze the provided meeting \
transcript and extract structured information.

You MUST respond with valid JSON only.";

const FREE_NOTES_PREAMBLE: &str = "You are an expert meeting assistant. The user has provided raw, \
unstructured notes taken during a meeting. These may be bullet points, fragments, abbreviations, \
shorthand, or stream-of-consciousness text rather than a clean transcript.

Your job is to interpret these notes intelligently and reconstruct the meeting structure:
- Infer who was likely present from any names, roles, or initials mentioned
- Identify tasks and who they likely belong to, even if not explicitly assigned
- Detect decisions even if written as \"→ do X\" or \"agreed: Y\"
- Infer priorities from urgency language (\"ASAP\", \"urgent\", \"when we have time\", \"low prio\", etc.)
- Write the summary in polished, professional prose, not in the style of the notes
- If something is ambiguous, make a reasonable inference rather than leaving it empty

You MUST respond with valid JSON only.";

#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    #[default]
    Transcript,
    FreeNotes,
}

impl InputType {
    pub fn system_prompt(self) -> String {
        let preamble = match self {
            InputType::Transcript => TRANSCRIPT_PREAMBLE,
            InputType::FreeNotes => FREE_NOTES_PREAMBLE,
        };
        format!("{preamble}{JSON_SCHEMA}")
    }

    pub fn user_message(self, text: &str) -> String {
        match self {
            InputType::Transcript => format!("Please analyze this meeting transcript:\n\n{text}"),
            InputType::FreeNotes => format!("Please structure these raw meeting notes:\n\n{text}"),
        }
    }
}

/// A request rejected before any provider was contacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Rejects input shorter than [`MIN_TEXT_LEN`] characters once trimmed.
pub fn validate_text(text: &str, message: &str) -> Result<(), ValidationError> {
    if text.trim().chars().count() < MIN_TEXT_LEN {
        return Err(ValidationError::new(message));
    }
    Ok(())
}

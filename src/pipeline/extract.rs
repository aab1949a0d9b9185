//! Result extraction: accumulated model output to [`MeetingSummary`].
//!
//! Models are told to answer with raw JSON but regularly wrap it in a
//! markdown fence anyway, so fences are stripped before parsing.

use std::fmt;

use log::debug;

use crate::core::summary::MeetingSummary;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionError {
    pub reason: &'static str,
    pub detail: String,
}

impl ExtractionError {
    pub const INVALID_JSON: &'static str = "invalid JSON";
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

impl std::error::Error for ExtractionError {}

/// Removes a leading fence (with its optional language tag) and a trailing
/// fence, repeating until neither is left.
pub fn strip_fences(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let next = strip_one_layer(current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_one_layer(text: &str) -> &str {
    let mut body = text;
    if let Some(rest) = body.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
    }
    if let Some(rest) = body.strip_suffix(FENCE) {
        body = rest;
    }
    body.trim()
}

/// Parses the full text of a finished stream. Failing to parse as JSON is
/// the only error; any document that parses is accepted as it is.
pub fn extract(full_text: &str) -> Result<MeetingSummary, ExtractionError> {
    let body = strip_fences(full_text);

    let document: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        debug!("Model output is not JSON: {}", e);
        ExtractionError {
            reason: ExtractionError::INVALID_JSON,
            detail: e.to_string(),
        }
    })?;

    Ok(MeetingSummary::from_document(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::summary::Priority;
    use crate::test_support::{sample_summary, sample_summary_json};

    #[test]
    fn test_fenced_and_bare_documents_extract_identically() {
        let bare = r#"{"summary":"x","actionItems":[],"decisions":[],"participants":[],"meetingType":"Standup","keyTopics":[]}"#;
        let fenced = format!("```json\n{bare}\n```");

        let from_fenced = extract(&fenced).unwrap();
        assert_eq!(from_fenced, extract(bare).unwrap());
        assert_eq!(from_fenced.summary, "x");
    }

    #[test]
    fn test_round_trip_through_fences() {
        let summary = sample_summary();
        for wrapped in [
            sample_summary_json(),
            format!("```json\n{}\n```", sample_summary_json()),
            format!("```\n{}\n```\n", sample_summary_json()),
            format!("  ```JSON\n```json\n{}\n```\n```  ", sample_summary_json()),
        ] {
            assert_eq!(extract(&wrapped).unwrap(), summary, "input: {wrapped}");
        }
    }

    #[test]
    fn test_strip_fences_is_idempotent() {
        for input in [
            "```json\n{}\n```",
            "```\n```\n{}\n```\n```",
            "{\"a\":\"```\"}",
            "plain",
            "```",
            "",
        ] {
            let once = strip_fences(input);
            assert_eq!(strip_fences(once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_not_json_is_an_extraction_error() {
        let err = extract("not json at all").unwrap_err();
        assert_eq!(err.reason, ExtractionError::INVALID_JSON);
        assert!(err.to_string().starts_with("invalid JSON: "));
    }

    #[test]
    fn test_truncated_json_is_invalid() {
        let err = extract(r#"{"summary": "cut off"#).unwrap_err();
        assert_eq!(err.reason, ExtractionError::INVALID_JSON);
    }

    #[test]
    fn test_null_fields_are_accepted() {
        let summary = extract(
            r#"```json
{"summary":"x","actionItems":[{"task":"t","owner":null,"deadline":null,"priority":"high"}],"decisions":null,"participants":[],"meetingType":null,"keyTopics":[]}
```"#,
        )
        .unwrap();
        assert_eq!(summary.summary, "x");
        assert_eq!(summary.action_items[0].owner, "");
        assert_eq!(summary.action_items[0].deadline, "");
        assert_eq!(summary.action_items[0].priority, Priority::High);
        assert!(summary.decisions.is_empty());
    }

    #[test]
    fn test_any_parsed_document_is_accepted() {
        for input in [r#"{"summary": 5}"#, "[1, 2]", r#"{"actionItems": "none"}"#, "null"] {
            assert!(extract(input).is_ok(), "input: {input}");
        }
    }

    #[test]
    fn test_partial_documents_keep_what_the_model_wrote() {
        let summary =
            extract(r#"{"actionItems":[{"task":"Call vendor","priority":"ASAP"}]}"#).unwrap();
        assert_eq!(summary.summary, "");
        assert_eq!(summary.action_items[0].task, "Call vendor");
        assert_eq!(summary.action_items[0].priority, Priority::Other("ASAP".into()));
        assert!(serde_json::to_string(&summary).unwrap().contains(r#""priority":"ASAP""#));
    }
}

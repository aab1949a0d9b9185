//! The event-stream wire format.
//!
//! Each event travels as one frame, `data: <json>\n\n`, where the JSON is one
//! of `{"chunk": ..}`, `{"done": true, "full": ..}` or `{"error": ..}`. The
//! encoder runs on the server; [`FrameDecoder`] is its counterpart on the
//! consuming side and copes with frames split across arbitrary reads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One event of a summarize stream. `Chunk` may repeat; `Done` or `Error`
/// terminates the stream and is always last.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Payload", into = "Payload")]
pub enum WireEvent {
    /// The text increment carried by one delta.
    Chunk(String),
    /// Natural end; carries the full accumulated text.
    Done(String),
    Error(String),
}

impl WireEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WireEvent::Chunk(_))
    }
}

// Flat JSON shape shared by all three variants.
#[derive(Serialize, Deserialize, Default)]
struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<WireEvent> for Payload {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Chunk(text) => Payload {
                chunk: Some(text),
                ..Default::default()
            },
            WireEvent::Done(full) => Payload {
                done: true,
                full: Some(full),
                ..Default::default()
            },
            WireEvent::Error(message) => Payload {
                error: Some(message),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<Payload> for WireEvent {
    type Error = String;

    fn try_from(payload: Payload) -> Result<Self, String> {
        if let Some(message) = payload.error {
            return Ok(WireEvent::Error(message));
        }
        if payload.done {
            return payload
                .full
                .map(WireEvent::Done)
                .ok_or_else(|| "done event without full text".to_string());
        }
        payload
            .chunk
            .map(WireEvent::Chunk)
            .ok_or_else(|| "event has none of chunk, done or error".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    Encode(String),
    /// A complete frame whose payload is not a valid event.
    MalformedFrame { frame: String, reason: String },
    /// Input ended with an unterminated frame still buffered.
    Truncated(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Encode(msg) => write!(f, "failed to encode event: {msg}"),
            WireError::MalformedFrame { frame, reason } => {
                write!(f, "malformed frame {frame:?}: {reason}")
            }
            WireError::Truncated(rest) => {
                write!(f, "stream ended inside a frame ({} bytes pending)", rest.len())
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Renders one event as a complete frame.
pub fn encode_frame(event: &WireEvent) -> Result<String, WireError> {
    let json = serde_json::to_string(event).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(format!("data: {json}\n\n"))
}

/// Incremental frame decoder. Bytes are buffered until a blank line closes a
/// frame; an incomplete tail is kept for the next `push`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every event completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<WireEvent, WireError>> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = find_delimiter(&self.buffer[self.scanned..]) {
            let end = self.scanned + offset;
            if let Some(event) = decode_frame(&self.buffer[start..end]) {
                events.push(event);
            }
            start = end + 2;
            self.scanned = start;
        }
        self.buffer.drain(..start);
        // A trailing newline may be the first half of the next delimiter.
        self.scanned = self.buffer.len().saturating_sub(1);
        events
    }

    /// Ends the input. Whitespace left over is fine; anything else means the
    /// last frame was cut off.
    pub fn finish(&mut self) -> Result<(), WireError> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let rest = String::from_utf8_lossy(&rest);
        if rest.trim().is_empty() {
            Ok(())
        } else {
            Err(WireError::Truncated(rest.into_owned()))
        }
    }
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\n\n")
}

/// Decodes one frame body. `None` for frames carrying no data lines
/// (keep-alive comments, stray blank lines).
fn decode_frame(frame: &[u8]) -> Option<Result<WireEvent, WireError>> {
    let text = String::from_utf8_lossy(frame);
    let data: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data.is_empty() {
        return None;
    }

    let payload = data.join("\n");
    Some(
        serde_json::from_str::<WireEvent>(&payload).map_err(|e| WireError::MalformedFrame {
            frame: payload.clone(),
            reason: e.to_string(),
        }),
    )
}

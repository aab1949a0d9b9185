//! Line splitter for upstream provider event streams.
//!
//! Providers answer streaming requests with `event:`/`data:` lines. Network
//! reads can split a line (or a multi-byte character) anywhere, so bytes are
//! buffered until a full line is available.

use log::debug;

/// One `data:` payload together with the `event:` name that preceded it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub event_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
    current_event_type: Option<String>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every `data:` payload completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<UpstreamEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.process_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<UpstreamEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).into_owned();
        self.process_line(line.trim())
    }

    fn process_line(&mut self, line: &str) -> Option<UpstreamEvent> {
        if line.is_empty() {
            // Blank line ends the event block.
            self.current_event_type = None;
            return None;
        }

        if let Some(event_type) = line.strip_prefix("event:") {
            let event_type = event_type.trim();
            debug!("SSE event type: {}", event_type);
            self.current_event_type = Some(event_type.to_string());
            return None;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            debug!(
                "SSE data for event {:?}: {} bytes",
                self.current_event_type,
                data.len()
            );
            return Some(UpstreamEvent {
                event_type: self.current_event_type.take(),
                data: data.to_string(),
            });
        }

        // Comments (":"), id: and retry: lines carry nothing we use.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_event_type_with_data() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.push(b"event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
        assert_eq!(
            events,
            vec![UpstreamEvent {
                event_type: Some("message_stop".to_string()),
                data: "{\"type\":\"message_stop\"}".to_string(),
            }]
        );
    }

    #[test]
    fn test_data_without_event_type() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.push(b"data: [DONE]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, None);
        assert_eq!(events[0].data, "[DONE]");
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let events = buffer.push(b":1}\n");
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let mut buffer = SseLineBuffer::new();
        let line = "data: café\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = line.len() - 2;
        assert!(buffer.push(&line[..split]).is_empty());
        let events = buffer.push(&line[split..]);
        assert_eq!(events[0].data, "café");
    }

    #[test]
    fn test_ignores_comments_and_crlf() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.push(b": keep-alive\r\nid: 7\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: tail").is_empty());
        let event = buffer.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(buffer.finish().is_none());
    }
}

//! Stream aggregation.
//!
//! The aggregator pulls deltas from a provider stream, accumulates the full
//! text and turns each step into a [`WireEvent`]: one `Chunk` per delta, then
//! exactly one `Done` or `Error`. It never looks inside the text; parsing
//! happens once the stream is over.

use futures::{Stream, StreamExt};
use log::debug;

use super::wire::WireEvent;
use crate::inference::StreamChunk;

/// Progress never passes this while text is still arriving.
pub const MAX_STREAMING_PROGRESS: u8 = 90;
const CHARS_PER_PERCENT: usize = 20;

/// Coarse progress for `chars` characters of output. A heuristic only: there
/// is no expected length to normalize against.
pub fn estimate_progress(chars: usize) -> u8 {
    let percent = (chars / CHARS_PER_PERCENT).min(MAX_STREAMING_PROGRESS as usize);
    percent as u8
}

/// Per-request accumulator. Text is append-only and progress only moves up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    accumulated_text: String,
    char_count: usize,
    progress_percent: u8,
    is_complete: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one increment. Ignored once the stream is complete.
    pub fn append(&mut self, text: &str) {
        if self.is_complete {
            return;
        }
        self.accumulated_text.push_str(text);
        self.char_count += text.chars().count();
        self.progress_percent = estimate_progress(self.char_count);
    }

    /// Marks the natural end of the stream and forces progress to 100.
    pub fn complete(&mut self) {
        self.is_complete = true;
        self.progress_percent = 100;
    }

    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn into_text(self) -> String {
        self.accumulated_text
    }

    pub fn progress(&self) -> u8 {
        self.progress_percent
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }
}

pub struct Aggregator<S> {
    upstream: S,
    state: StreamState,
    finished: bool,
}

impl<S> Aggregator<S>
where
    S: Stream<Item = StreamChunk> + Unpin,
{
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            state: StreamState::new(),
            finished: false,
        }
    }

    /// Next wire event, or `None` once a terminal event has been returned.
    pub async fn next_event(&mut self) -> Option<WireEvent> {
        if self.finished {
            return None;
        }
        match self.upstream.next().await {
            Some(StreamChunk::Delta(delta)) => {
                self.state.append(&delta.text);
                Some(WireEvent::Chunk(delta.text))
            }
            Some(StreamChunk::Failed(e)) => {
                self.finished = true;
                debug!("Stream failed after {} chars: {}", self.state.char_count, e);
                Some(WireEvent::Error(e.to_string()))
            }
            None => {
                self.finished = true;
                self.state.complete();
                debug!("Stream complete ({} chars)", self.state.char_count);
                Some(WireEvent::Done(self.state.text().to_string()))
            }
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Adapts the aggregator into a stream of wire events.
    pub fn into_events(self) -> impl Stream<Item = WireEvent> {
        futures::stream::unfold(self, |mut aggregator| async move {
            aggregator
                .next_event()
                .await
                .map(|event| (event, aggregator))
        })
    }
}

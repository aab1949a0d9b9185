use super::provider::ProviderError;

/// An incremental fragment of generated text, already stripped of any
/// provider-specific envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDelta {
    pub text: String,
}

impl TokenDelta {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Represents one item travelling from a provider task to its consumer.
///
/// End-of-stream is the channel closing without a `Failed` item.
#[derive(Debug)]
pub enum StreamChunk {
    Delta(TokenDelta),
    Failed(ProviderError),
}

/// How a provider is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeMode {
    /// Wait for the whole response.
    OneShot,
    /// Receive deltas as they are generated.
    Streaming,
}

pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse;
pub mod stream;
pub mod types;

pub use provider::{CompletionProvider, CompletionRequest, ProviderError};
pub use providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};
pub use registry::{Invocation, ProviderRegistry};
pub use stream::DeltaStream;
pub use types::{InvokeMode, StreamChunk, TokenDelta};

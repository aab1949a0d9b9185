pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Output token ceiling applied to every provider unless configured otherwise.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

//! From token deltas to a structured summary.
//!
//! `aggregator` turns a provider's delta stream into wire events, `wire`
//! frames those events for the HTTP body (and decodes them on the client),
//! `extract` parses the accumulated text, and `compare` runs two providers
//! side by side.

pub mod aggregator;
pub mod compare;
pub mod extract;
pub mod wire;

pub use aggregator::{Aggregator, StreamState, estimate_progress};
pub use compare::{CompareOutcome, CompareResponse, CompareResult, Comparator};
pub use extract::{ExtractionError, extract, strip_fences};
pub use wire::{FrameDecoder, WireError, WireEvent, encode_frame};

//! # Core Domain
//!
//! Everything about meetings that is independent of how a model is called
//! or how results travel over HTTP.
//!
//! ## Modules
//!
//! - [`summary`]: `MeetingSummary` and its parts, the parsed model output
//! - [`request`]: input types, prompts and request validation
//! - [`history`]: saved summaries behind the `HistoryStore` trait
//! - [`tracker`]: action-item export behind the `IssueTracker` trait
//! - [`config`]: layered configuration (file, env, CLI)
//! - [`logging`]: `simplelog` setup

pub mod config;
pub mod history;
pub mod logging;
pub mod request;
pub mod summary;
pub mod tracker;

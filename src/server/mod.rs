//! # HTTP Server
//!
//! axum routes over the pipeline. All shared state lives in [`AppState`],
//! built once at startup and cloned into each handler.
//!
//! | Route | |
//! |---|---|
//! | `POST /api/summarize` | event-stream of wire frames |
//! | `POST /api/compare` | two providers, one JSON response |
//! | `GET/POST /api/history` | list (paged) / save |
//! | `GET/PATCH/DELETE /api/history/{id}` | one saved entry |
//! | `POST /api/integrations/{tracker}` | export action items |
//! | `PATCH /api/integrations/{tracker}/items/{external_id}` | sync an issue's status |
//! | `GET /health` | liveness |
//!
//! History requests are scoped by the optional `x-owner-id` header.

mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use log::info;
use tokio::net::TcpListener;

pub use error::{ApiError, ErrorBody};
pub use handlers::OWNER_HEADER;

use crate::core::history::{HistoryStore, InMemoryHistoryStore};
use crate::core::tracker::TrackerRegistry;
use crate::inference::ProviderRegistry;
use crate::pipeline::Comparator;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub comparator: Arc<Comparator>,
    pub history: Arc<dyn HistoryStore>,
    pub trackers: Arc<TrackerRegistry>,
}

impl AppState {
    pub fn new(registry: ProviderRegistry, history: Arc<dyn HistoryStore>) -> Self {
        let registry = Arc::new(registry);
        Self {
            comparator: Arc::new(Comparator::new(registry.clone())),
            registry,
            history,
            trackers: Arc::new(TrackerRegistry::new()),
        }
    }

    /// Replaces the connected issue trackers.
    pub fn with_trackers(self, trackers: TrackerRegistry) -> Self {
        Self {
            trackers: Arc::new(trackers),
            ..self
        }
    }

    /// State with a fresh in-memory history.
    pub fn in_memory(registry: ProviderRegistry) -> Self {
        Self::new(registry, Arc::new(InMemoryHistoryStore::new()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/summarize", post(handlers::summarize))
        .route("/api/compare", post(handlers::compare))
        .route(
            "/api/history",
            get(handlers::list_history).post(handlers::create_history),
        )
        .route(
            "/api/history/{id}",
            get(handlers::get_history)
                .patch(handlers::update_history)
                .delete(handlers::delete_history),
        )
        .route("/api/integrations/{tracker}", post(handlers::export_to_tracker))
        .route(
            "/api/integrations/{tracker}/items/{external_id}",
            patch(handlers::transition_tracker_item),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serves until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}

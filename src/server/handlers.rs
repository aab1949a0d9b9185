use std::convert::Infallible;

use async_stream::stream;
use axum::Json;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use crate::ProviderId;
use crate::core::history::{HistoryEntry, HistoryPage, NewHistoryEntry};
use crate::core::request::{InputType, validate_text};
use crate::core::summary::{ActionItem, MeetingSummary};
use crate::core::tracker::{ExportOutcome, export_action_items, sync_status};
use crate::inference::DeltaStream;
use crate::pipeline::{Aggregator, CompareResponse, encode_frame};

/// Encoded frames waiting for the client. A full buffer stalls the aggregator.
const FRAME_BUFFER: usize = 16;

/// Scopes history to one owner. Absent means the anonymous owner.
pub const OWNER_HEADER: &str = "x-owner-id";

const DEFAULT_MEETING_TYPE: &str = "Meeting";

fn owner_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: String,
    pub provider: ProviderId,
    #[serde(default)]
    pub input_type: InputType,
}

#[derive(Deserialize, Debug)]
pub struct CompareRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub providers: Vec<ProviderId>,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateHistoryRequest {
    pub summary: MeetingSummary,
}

#[derive(Serialize, Debug)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    pub meeting_type: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ExportResponse {
    pub results: Vec<ExportOutcome>,
}

#[derive(Deserialize, Debug)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Serialize, Debug)]
pub struct StatusResponse {
    pub ok: bool,
    pub synced: bool,
}

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// Streams a summary as event-stream frames. Validation and provider
/// configuration are checked before the response starts.
pub(crate) async fn summarize(
    State(state): State<AppState>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    validate_text(&request.text, "Text is too short.")?;

    let input_type = request.input_type;
    let deltas = state.registry.stream(
        request.provider,
        input_type.system_prompt(),
        input_type.user_message(&request.text),
    )?;
    info!(
        "Summarizing {} chars of {:?} via {}",
        request.text.chars().count(),
        input_type,
        request.provider
    );

    let headers = [
        (CONTENT_TYPE, "text/event-stream"),
        (CACHE_CONTROL, "no-cache"),
        (CONNECTION, "keep-alive"),
    ];
    Ok((headers, Body::from_stream(frame_stream(deltas))).into_response())
}

/// Runs the aggregator on its own task and hands encoded frames to the body
/// through a bounded channel. When the client disconnects the channel
/// closes, the aggregator is dropped, and with it the upstream read.
fn frame_stream(deltas: DeltaStream) -> impl Stream<Item = Result<String, Infallible>> {
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(FRAME_BUFFER);

    tokio::spawn(async move {
        let mut aggregator = Aggregator::new(deltas);
        loop {
            let event = tokio::select! {
                event = aggregator.next_event() => event,
                _ = frame_tx.closed() => {
                    debug!("Client disconnected mid-stream");
                    break;
                }
            };
            let Some(event) = event else { break };

            let frame = match encode_frame(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Dropping stream: {}", e);
                    break;
                }
            };
            if frame_tx.send(frame).await.is_err() {
                debug!("Client disconnected mid-stream");
                break;
            }
        }
    });

    stream! {
        while let Some(frame) = frame_rx.recv().await {
            yield Ok::<_, Infallible>(frame);
        }
    }
}

pub(crate) async fn compare(
    State(state): State<AppState>,
    body: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let Json(request) = body?;
    let response = state
        .comparator
        .compare(&request.text, &request.providers)
        .await?;
    Ok(Json(response))
}

pub(crate) async fn list_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(query) = query?;
    let page = state
        .history
        .list(owner_of(&headers), query.page, query.limit)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn create_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewHistoryEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryEntry>), ApiError> {
    let Json(entry) = body?;
    let created = state.history.create(entry, owner_of(&headers)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.history.get(id, owner_of(&headers)).await?))
}

pub(crate) async fn update_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateHistoryRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Path(id) = id?;
    let Json(request) = body?;
    state
        .history
        .update_summary(id, owner_of(&headers), request.summary)
        .await?;
    Ok(Json(Ack { ok: true }))
}

pub(crate) async fn delete_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Path(id) = id?;
    state.history.delete(id, owner_of(&headers)).await?;
    Ok(Json(Ack { ok: true }))
}

/// Creates one issue per action item in the named tracker.
pub(crate) async fn export_to_tracker(
    State(state): State<AppState>,
    Path(tracker): Path<String>,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Json<ExportResponse>, ApiError> {
    let Json(request) = body?;
    let tracker = state.trackers.get(&tracker)?;
    let meeting_type = request
        .meeting_type
        .as_deref()
        .unwrap_or(DEFAULT_MEETING_TYPE);
    let results = export_action_items(tracker.as_ref(), &request.action_items, meeting_type).await?;
    Ok(Json(ExportResponse { results }))
}

/// Moves an issue the tracker created to a new status. A tracker that
/// refuses the transition is reported with `synced: false`, not an error.
pub(crate) async fn transition_tracker_item(
    State(state): State<AppState>,
    Path((tracker, external_id)): Path<(String, String)>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = body?;
    let tracker = state.trackers.get(&tracker)?;
    let synced = sync_status(tracker.as_ref(), &external_id, &request.status).await;
    Ok(Json(StatusResponse { ok: true, synced }))
}

pub(crate) async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

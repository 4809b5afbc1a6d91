use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::routes::{error_response, ApiError};
use crate::api::state::AppState;
use crate::application::QueryResponse;
use crate::domain::{ConversationTurn, Query};
use crate::infrastructure::{JobResult, ProcessChatJob};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message")]
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    fn into_query(self) -> Query {
        Query::new(self.query).with_history(self.history)
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// One SSE event per pipeline event, named after its `type`.
///
/// The client disconnecting drops the stream, which cancels generation.
pub async fn stream_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = state
        .pipeline
        .process_query(request.into_query())
        .map(|event| Event::default().event(event.kind()).json_data(&event));

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    state
        .pipeline
        .answer(request.into_query())
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn enqueue_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<EnqueueResponse>, StatusCode> {
    if request.query.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let job = ProcessChatJob::new(request.query).with_history(request.history);

    let job_id = state.job_producer.push_chat_job(&job).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to queue chat job");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(EnqueueResponse {
        job_id,
        status: "queued".to_string(),
    }))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResult>, StatusCode> {
    let result = state
        .job_producer
        .get_job_status(&job_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get job status");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    result.map(Json).ok_or(StatusCode::NOT_FOUND)
}

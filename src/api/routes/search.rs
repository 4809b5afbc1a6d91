use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::routes::{error_response, ApiError};
use crate::api::state::AppState;
use crate::domain::Citation;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub citations: Vec<Citation>,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let citations = state
        .pipeline
        .search(&request.query, request.limit)
        .await
        .map_err(error_response)?;

    Ok(Json(SearchResponse { citations }))
}

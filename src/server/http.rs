use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::RelayError;
use crate::hub::unix_timestamp;
use crate::playlist::PlayableTrack;
use crate::service::{PlaylistDocument, SearchResponse};

type ApiResult<T> = Result<Json<T>, RelayError>;

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Protocol(_) | RelayError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    limit: Option<usize>,
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": unix_timestamp(),
    }))
}

/// Probe the catalog with a one-item search, bypassing the cache.
pub(super) async fn catalog_check(State(state): State<AppState>) -> ApiResult<Value> {
    let sample = state.catalog.search("test", 1).await.map_err(|e| {
        tracing::error!(error = %e, "Catalog check failed");
        RelayError::upstream(e)
    })?;

    Ok(Json(json!({
        "status": "ok",
        "message": format!("{} catalog is working", state.catalog.name()),
        "sampleResults": sample,
    })))
}

pub(super) async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let limit = params.limit.unwrap_or(state.default_limit);
    let response = state.search.search(&query, limit).await?;
    Ok(Json(response))
}

pub(super) async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PlaylistDocument> {
    Ok(Json(state.playlists.get_playlist(&id).await?))
}

pub(super) async fn refresh_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.playlists.refresh_playlist(&id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Playlist refreshed",
    })))
}

pub(super) async fn first_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PlayableTrack> {
    Ok(Json(state.playlists.first_playable_track(&id).await?))
}

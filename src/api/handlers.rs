use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PlaylistId, TrackId, UserId},
    services::{
        pipeline::{self, RunSettings},
        Recommendation,
    },
};

use super::{request_id::RequestId, session::Session, state::RecommendationRun, AppState};

// Request/Response types

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub candidate_count: usize,
    pub page_count: usize,
    pub page: usize,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub run_id: Uuid,
    pub page: usize,
    pub page_count: usize,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePlaylistRequest {
    #[serde(default)]
    pub page: usize,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub playlist_id: PlaylistId,
    pub name: String,
    pub track_count: usize,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Runs the recommendation pipeline for the caller and returns the first page
pub async fn create_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    session: Session,
) -> AppResult<(StatusCode, Json<RunResponse>)> {
    tracing::info!(
        request_id = %request_id,
        user_id = %session.user_id,
        "Processing recommendation request"
    );

    let settings = RunSettings::from_config(&state.config)?;
    let ranking = pipeline::recommend_for_user(
        Arc::new(session.client.clone()),
        &session.user_id,
        &state.catalog,
        &settings,
    )
    .await?;

    let created_at = Utc::now();
    let candidate_count = ranking.len();
    let page_count = ranking.page_count();
    let recommendations = ranking.page(0).to_vec();

    let run_id = state
        .insert_run(RecommendationRun {
            user_id: session.user_id.clone(),
            created_at,
            ranking,
        })
        .await;

    tracing::info!(
        request_id = %request_id,
        run_id = %run_id,
        candidate_count,
        "Recommendation run stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(RunResponse {
            run_id,
            user_id: session.user_id,
            created_at,
            candidate_count,
            page_count,
            page: 0,
            recommendations,
        }),
    ))
}

/// Returns page `n` of a stored run
pub async fn get_page(
    State(state): State<AppState>,
    Path((run_id, page)): Path<(Uuid, usize)>,
) -> AppResult<Json<PageResponse>> {
    let run = state
        .get_run(&run_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("recommendation run {}", run_id)))?;

    Ok(Json(PageResponse {
        run_id,
        page,
        page_count: run.ranking.page_count(),
        recommendations: run.ranking.page(page).to_vec(),
    }))
}

/// Creates a playlist on the caller's account from one page of a run
pub async fn create_playlist(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    session: Session,
    Json(request): Json<CreatePlaylistRequest>,
) -> AppResult<(StatusCode, Json<PlaylistResponse>)> {
    let run = state
        .get_run(&run_id)
        .await
        .filter(|run| run.user_id == session.user_id)
        .ok_or_else(|| AppError::NotFound(format!("recommendation run {}", run_id)))?;

    let track_ids: Vec<TrackId> = run
        .ranking
        .page(request.page)
        .iter()
        .map(|r| r.track.id.clone())
        .collect();

    if track_ids.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "page {} of run {} has no tracks",
            request.page, run_id
        )));
    }

    let name = request
        .name
        .unwrap_or_else(|| state.config.playlist_name.clone());
    let description = request
        .description
        .unwrap_or_else(|| state.config.playlist_description.clone());

    let (handle, track_count) = pipeline::publish_playlist(
        Arc::new(session.client.clone()),
        session.user_id.clone(),
        &name,
        &description,
        &track_ids,
        state.config.playlist_batch_limit,
    )
    .await?;

    tracing::info!(
        run_id = %run_id,
        playlist_id = %handle.id,
        track_count,
        "Playlist created from recommendations"
    );

    Ok((
        StatusCode::CREATED,
        Json(PlaylistResponse {
            playlist_id: handle.id,
            name: handle.name,
            track_count,
        }),
    ))
}

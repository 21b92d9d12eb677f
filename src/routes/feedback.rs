use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::FeedbackEvent,
    routes::AppState,
    services::evidence,
};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: i32,
    pub movie_id: i32,
    pub liked: bool,
}

/// Handler for feedback submission
///
/// Resolves and stores the rated movie up front so later evidence
/// packaging always finds it locally. One active event per (user, movie)
/// pair; a second submission for the same pair is rejected.
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<StatusCode> {
    if request.user_id <= 0 || request.movie_id <= 0 {
        return Err(AppError::InvalidInput(
            "user_id and movie_id must be positive".to_string(),
        ));
    }

    let resolved = evidence::resolve_movie(
        state.store.as_ref(),
        state.catalog.as_ref(),
        request.movie_id,
    )
    .await?;
    if resolved.is_none() {
        return Err(AppError::NotFound(format!(
            "movie {} not found",
            request.movie_id
        )));
    }

    let event = FeedbackEvent {
        user_id: request.user_id,
        movie_id: request.movie_id,
        liked: request.liked,
    };

    if !state.store.insert_feedback(&event).await? {
        return Err(AppError::InvalidInput(format!(
            "feedback for movie {} already recorded",
            request.movie_id
        )));
    }

    tracing::info!(
        user_id = request.user_id,
        movie_id = request.movie_id,
        liked = request.liked,
        "Feedback recorded"
    );

    Ok(StatusCode::CREATED)
}

/// Handler for listing a user's active feedback
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<FeedbackEvent>>> {
    let events = state.store.feedback_for_user(user_id).await?;
    Ok(Json(events))
}

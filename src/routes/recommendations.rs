use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::{MovieRecord, RecommendationRecord},
    routes::AppState,
};

/// Handler for producing the next recommendation for a user
///
/// Cycles for the same user run one at a time behind a per-user lock;
/// the no-repeat check and feedback consumption assume no interleaving.
pub async fn recommend(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<MovieRecord>> {
    if user_id <= 0 {
        return Err(AppError::InvalidInput(
            "user_id must be positive".to_string(),
        ));
    }

    let lock = state.user_lock(user_id).await;
    let guard = lock.lock().await;

    let result = state.recommender().produce_recommendation(user_id).await;

    drop(guard);
    drop(lock);
    state.evict_user_lock(user_id).await;

    Ok(Json(result?))
}

/// Handler for listing a user's recommendation log, newest first
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<RecommendationRecord>>> {
    let records = state.store.recommendations_for_user(user_id).await?;
    Ok(Json(records))
}

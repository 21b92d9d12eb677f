use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Distinct, recoverable outcomes of a recommendation cycle
///
/// None of these are process-fatal; the orchestrator returns them to its
/// caller, which decides whether to retry (e.g. a cold-start collision) or
/// surface the failure.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecommendError {
    /// The assembler produced no candidates from non-empty feedback
    #[error("No candidates could be assembled from the user's feedback")]
    NoCandidates,

    /// The packager could not build a usable evidence payload
    #[error("Insufficient data to build an evidence package")]
    InsufficientData,

    /// The scoring call failed or its reply was unusable
    #[error("Scoring oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The chosen movie was already recommended to this user
    #[error("Movie {movie_id} was already recommended to user {user_id}")]
    AlreadyRecommended { user_id: i32, movie_id: i32 },

    /// Cold-start had nothing usable to offer
    #[error("No candidate available for cold-start recommendation")]
    NoCandidateAvailable,

    /// A store write failed after a recommendation decision was made
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Recommend(ref kind) => {
                let status = match kind {
                    RecommendError::AlreadyRecommended { .. } => StatusCode::CONFLICT,
                    RecommendError::NoCandidates
                    | RecommendError::InsufficientData
                    | RecommendError::NoCandidateAvailable => StatusCode::UNPROCESSABLE_ENTITY,
                    RecommendError::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
                    RecommendError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_recommended_maps_to_conflict() {
        let err = AppError::from(RecommendError::AlreadyRecommended {
            user_id: 1,
            movie_id: 42,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_data_shortage_kinds_map_to_unprocessable() {
        for kind in [
            RecommendError::NoCandidates,
            RecommendError::InsufficientData,
            RecommendError::NoCandidateAvailable,
        ] {
            let response = AppError::from(kind).into_response();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn test_oracle_unavailable_maps_to_bad_gateway() {
        let err = AppError::from(RecommendError::OracleUnavailable("timeout".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_recommend_error_display() {
        let err = RecommendError::AlreadyRecommended {
            user_id: 7,
            movie_id: 100,
        };
        assert_eq!(
            err.to_string(),
            "Movie 100 was already recommended to user 7"
        );
    }
}

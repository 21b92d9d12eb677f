use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{FeedbackEvent, GenreRef, MovieRecord, RecommendationRecord},
};

pub mod postgres;

pub use postgres::PgEvidenceStore;

/// Persistence boundary for feedback, movies, genres and recommendations
///
/// The recommendation core only talks to this trait; `PgEvidenceStore` is
/// the production implementation and tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Inserts a like/dislike event; returns false when the (user, movie)
    /// pair already has an active event
    async fn insert_feedback(&self, event: &FeedbackEvent) -> AppResult<bool>;

    /// All active feedback events for a user, oldest first
    async fn feedback_for_user(&self, user_id: i32) -> AppResult<Vec<FeedbackEvent>>;

    /// Bulk-deletes a user's active feedback; returns false when nothing
    /// was deleted
    async fn clear_feedback(&self, user_id: i32) -> AppResult<bool>;

    /// The user's preferred genres, as selected at signup
    async fn preferred_genres(&self, user_id: i32) -> AppResult<Vec<GenreRef>>;

    async fn movie_exists(&self, movie_id: i32) -> AppResult<bool>;

    async fn movie_by_id(&self, movie_id: i32) -> AppResult<Option<MovieRecord>>;

    async fn store_movie(&self, movie: &MovieRecord) -> AppResult<bool>;

    /// Whether the movie already has genre associations; callers check this
    /// before `store_movie_genres` so re-resolution never double-inserts
    async fn movie_has_genres(&self, movie_id: i32) -> AppResult<bool>;

    async fn store_movie_genres(&self, movie_id: i32, genre_ids: &[i32]) -> AppResult<bool>;

    /// Genres associated with a movie, by join against the reference table
    async fn genres_for_movie(&self, movie_id: i32) -> AppResult<Vec<GenreRef>>;

    /// Appends to the recommendation log; callers enforce the no-repeat
    /// invariant via `already_recommended` first
    async fn insert_recommendation(&self, user_id: i32, movie_id: i32) -> AppResult<bool>;

    async fn already_recommended(&self, user_id: i32, movie_id: i32) -> AppResult<bool>;

    /// The user's recommendation log, newest first
    async fn recommendations_for_user(&self, user_id: i32)
        -> AppResult<Vec<RecommendationRecord>>;
}

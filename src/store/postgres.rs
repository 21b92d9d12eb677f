use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{FeedbackEvent, GenreRef, MovieRecord, RecommendationRecord},
    store::EvidenceStore,
};

/// Postgres-backed evidence store
///
/// Mirrors the catalog schema: `movies`, `genres`, `movie_genres`,
/// `feedback`, `user_preferred_genres` and the append-only `recommendations`
/// log.
#[derive(Clone)]
pub struct PgEvidenceStore {
    pool: PgPool,
}

impl PgEvidenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceStore for PgEvidenceStore {
    async fn insert_feedback(&self, event: &FeedbackEvent) -> AppResult<bool> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT 1::bigint FROM feedback WHERE user_id = $1 AND movie_id = $2",
        )
        .bind(event.user_id)
        .bind(event.movie_id)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            tracing::warn!(
                user_id = event.user_id,
                movie_id = event.movie_id,
                "Feedback already exists for this user and movie"
            );
            return Ok(false);
        }

        let result = sqlx::query("INSERT INTO feedback (user_id, movie_id, liked) VALUES ($1, $2, $3)")
            .bind(event.user_id)
            .bind(event.movie_id)
            .bind(event.liked)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn feedback_for_user(&self, user_id: i32) -> AppResult<Vec<FeedbackEvent>> {
        let events = sqlx::query_as::<_, FeedbackEvent>(
            "SELECT user_id, movie_id, liked FROM feedback WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn clear_feedback(&self, user_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM feedback WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            user_id = user_id,
            deleted = result.rows_affected(),
            "Cleared feedback events"
        );

        Ok(result.rows_affected() > 0)
    }

    async fn preferred_genres(&self, user_id: i32) -> AppResult<Vec<GenreRef>> {
        let genres = sqlx::query_as::<_, GenreRef>(
            r#"
            SELECT g.id, g.name
            FROM genres g
            JOIN user_preferred_genres upg ON upg.genre_id = g.id
            WHERE upg.user_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn movie_exists(&self, movie_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn movie_by_id(&self, movie_id: i32) -> AppResult<Option<MovieRecord>> {
        let movie = sqlx::query_as::<_, MovieRecord>(
            r#"
            SELECT id, title, release_date, original_language, popularity,
                   adult, overview, poster_path
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movie)
    }

    async fn store_movie(&self, movie: &MovieRecord) -> AppResult<bool> {
        // ON CONFLICT keeps concurrent first-encounter inserts idempotent
        let result = sqlx::query(
            r#"
            INSERT INTO movies (id, title, release_date, original_language,
                                popularity, adult, overview, poster_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(&movie.release_date)
        .bind(&movie.original_language)
        .bind(movie.popularity)
        .bind(movie.adult)
        .bind(&movie.overview)
        .bind(&movie.poster_path)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn movie_has_genres(&self, movie_id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movie_genres WHERE movie_id = $1)")
                .bind(movie_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn store_movie_genres(&self, movie_id: i32, genre_ids: &[i32]) -> AppResult<bool> {
        let mut all_inserted = true;

        for genre_id in genre_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO movie_genres (movie_id, genre_id)
                VALUES ($1, $2)
                ON CONFLICT (movie_id, genre_id) DO NOTHING
                "#,
            )
            .bind(movie_id)
            .bind(genre_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() != 1 {
                all_inserted = false;
            }
        }

        Ok(all_inserted)
    }

    async fn genres_for_movie(&self, movie_id: i32) -> AppResult<Vec<GenreRef>> {
        let genres = sqlx::query_as::<_, GenreRef>(
            r#"
            SELECT g.id, g.name
            FROM genres g
            JOIN movie_genres mg ON mg.genre_id = g.id
            WHERE mg.movie_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(genres)
    }

    async fn insert_recommendation(&self, user_id: i32, movie_id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO recommendations (user_id, movie_id, created_at) VALUES ($1, $2, NOW())",
        )
        .bind(user_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn already_recommended(&self, user_id: i32, movie_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM recommendations WHERE user_id = $1 AND movie_id = $2)",
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn recommendations_for_user(
        &self,
        user_id: i32,
    ) -> AppResult<Vec<RecommendationRecord>> {
        let records = sqlx::query_as::<_, RecommendationRecord>(
            r#"
            SELECT id, user_id, movie_id, created_at
            FROM recommendations
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

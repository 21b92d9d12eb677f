use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A movie as cached in the local catalog
///
/// Created lazily on first encounter (feedback registration, candidate
/// resolution or a chosen recommendation) and kept indefinitely. Immutable
/// once stored; genre associations live in `movie_genres` and only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MovieRecord {
    pub id: i32,
    pub title: String,
    pub release_date: Option<String>,
    pub original_language: String,
    pub popularity: f64,
    pub adult: bool,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
}

/// Global genre reference data (TMDB genre ids)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GenreRef {
    pub id: i32,
    pub name: String,
}

/// A single like/dislike event, unique per (user, movie) while active
///
/// The orchestrator bulk-deletes a user's events once a personalized
/// recommendation cycle completes for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FeedbackEvent {
    pub user_id: i32,
    pub movie_id: i32,
    pub liked: bool,
}

/// Append-only log entry of a produced recommendation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecommendationRecord {
    pub id: i32,
    pub user_id: i32,
    pub movie_id: i32,
    pub created_at: DateTime<Utc>,
}

/// A movie record bundled with its resolved genres
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetails {
    pub movie: MovieRecord,
    pub genres: Vec<GenreRef>,
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// TMDB movie details response (GET /movie/{id})
///
/// The details endpoint embeds full genre objects, unlike the listing
/// endpoints which carry bare `genre_ids`.
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<GenreRef>,
}

impl From<TmdbMovie> for MovieDetails {
    fn from(movie: TmdbMovie) -> Self {
        MovieDetails {
            movie: MovieRecord {
                id: movie.id,
                title: movie.title,
                release_date: movie.release_date,
                original_language: movie.original_language,
                popularity: movie.popularity,
                adult: movie.adult,
                overview: movie.overview,
                poster_path: movie.poster_path,
            },
            genres: movie.genres,
        }
    }
}

/// One entry of a TMDB listing response (top rated, similar)
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbListEntry {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    #[allow(dead_code)] // Listing genres are re-resolved from the details endpoint
    pub genre_ids: Vec<i32>,
}

impl From<TmdbListEntry> for MovieRecord {
    fn from(entry: TmdbListEntry) -> Self {
        MovieRecord {
            id: entry.id,
            title: entry.title,
            release_date: entry.release_date,
            original_language: entry.original_language,
            popularity: entry.popularity,
            adult: entry.adult,
            overview: entry.overview,
            poster_path: entry.poster_path,
        }
    }
}

/// Paged TMDB listing response
#[derive(Debug, Deserialize)]
pub struct TmdbListResponse {
    #[serde(default)]
    pub results: Vec<TmdbListEntry>,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmdb_movie_to_details() {
        let json = r#"{
            "id": 27205,
            "title": "Inception",
            "release_date": "2010-07-15",
            "original_language": "en",
            "popularity": 83.952,
            "adult": false,
            "overview": "Cobb, a skilled thief...",
            "poster_path": "/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg",
            "genres": [
                {"id": 28, "name": "Action"},
                {"id": 878, "name": "Science Fiction"}
            ]
        }"#;

        let tmdb: TmdbMovie = serde_json::from_str(json).unwrap();
        let details: MovieDetails = tmdb.into();

        assert_eq!(details.movie.id, 27205);
        assert_eq!(details.movie.title, "Inception");
        assert_eq!(details.movie.release_date, Some("2010-07-15".to_string()));
        assert_eq!(details.movie.original_language, "en");
        assert!(!details.movie.adult);
        assert_eq!(details.genres.len(), 2);
        assert_eq!(details.genres[0].name, "Action");
    }

    #[test]
    fn test_tmdb_movie_missing_optional_fields() {
        let json = r#"{"id": 42, "title": "Obscure Film"}"#;

        let tmdb: TmdbMovie = serde_json::from_str(json).unwrap();
        let details: MovieDetails = tmdb.into();

        assert_eq!(details.movie.id, 42);
        assert_eq!(details.movie.release_date, None);
        assert_eq!(details.movie.original_language, "");
        assert_eq!(details.movie.popularity, 0.0);
        assert!(details.genres.is_empty());
    }

    #[test]
    fn test_tmdb_list_entry_to_record() {
        let json = r#"{
            "id": 603,
            "title": "The Matrix",
            "release_date": "1999-03-31",
            "original_language": "en",
            "popularity": 101.25,
            "adult": false,
            "genre_ids": [28, 878]
        }"#;

        let entry: TmdbListEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.genre_ids, vec![28, 878]);

        let record: MovieRecord = entry.into();
        assert_eq!(record.id, 603);
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.poster_path, None);
    }

    #[test]
    fn test_tmdb_list_response_defaults() {
        let response: TmdbListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.total_pages, 1);
    }

    #[test]
    fn test_feedback_event_roundtrip() {
        let event = FeedbackEvent {
            user_id: 7,
            movie_id: 42,
            liked: true,
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: FeedbackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}

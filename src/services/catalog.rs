//! TMDB catalog gateway
//!
//! Pure request/response lookups against The Movie Database: movie details,
//! a random popular movie for cold-start and diversification, and a random
//! similar movie for taste-driven candidates. No state beyond the HTTP
//! client and credentials.

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client as HttpClient, StatusCode};

use crate::{
    error::{AppError, AppResult},
    models::{MovieDetails, MovieRecord, TmdbListResponse, TmdbMovie},
};

/// Random picks are drawn from the first pages of the top-rated listing,
/// keeping cold-start suggestions watchable rather than uniformly obscure
const RANDOM_PAGE_SPAN: u32 = 20;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Full movie details with resolved genres; `None` when the catalog
    /// does not know the id
    async fn movie_details(&self, movie_id: i32) -> AppResult<Option<MovieDetails>>;

    /// A random well-rated movie, or `None` when the listing came back empty
    async fn random_movie(&self) -> AppResult<Option<MovieRecord>>;

    /// A random movie similar to the given one, or `None` when the catalog
    /// has no similar titles
    async fn random_similar_movie(&self, movie_id: i32) -> AppResult<Option<MovieRecord>>;
}

#[derive(Clone)]
pub struct TmdbCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbCatalog {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }

    /// Fetches one page of a TMDB listing endpoint
    async fn fetch_listing(&self, path: &str, page: u32) -> AppResult<TmdbListResponse> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.clone()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                path = %path,
                status = %status,
                body = %body,
                "TMDB listing request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// Picks a uniformly random entry of a listing page
fn pick_random_entry(listing: TmdbListResponse) -> Option<MovieRecord> {
    if listing.results.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..listing.results.len());
    listing.results.into_iter().nth(index).map(MovieRecord::from)
}

#[async_trait]
impl CatalogGateway for TmdbCatalog {
    async fn movie_details(&self, movie_id: i32) -> AppResult<Option<MovieDetails>> {
        let url = format!("{}/movie/{}", self.api_url, movie_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(movie_id = movie_id, "Movie not found in TMDB");
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                movie_id = movie_id,
                status = %status,
                body = %body,
                "TMDB details request failed"
            );
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {}: {}",
                status, body
            )));
        }

        let movie: TmdbMovie = response.json().await?;

        tracing::debug!(
            movie_id = movie_id,
            title = %movie.title,
            genres = movie.genres.len(),
            "Fetched movie details from TMDB"
        );

        Ok(Some(MovieDetails::from(movie)))
    }

    async fn random_movie(&self) -> AppResult<Option<MovieRecord>> {
        let page = rand::thread_rng().gen_range(1..=RANDOM_PAGE_SPAN);
        let listing = self.fetch_listing("/movie/top_rated", page).await?;

        let picked = pick_random_entry(listing);
        if let Some(movie) = &picked {
            tracing::info!(movie_id = movie.id, title = %movie.title, page = page, "Picked random movie");
        }

        Ok(picked)
    }

    async fn random_similar_movie(&self, movie_id: i32) -> AppResult<Option<MovieRecord>> {
        let path = format!("/movie/{}/similar", movie_id);
        let listing = self.fetch_listing(&path, 1).await?;

        let picked = pick_random_entry(listing);
        match &picked {
            Some(movie) => tracing::debug!(
                seed_movie_id = movie_id,
                movie_id = movie.id,
                title = %movie.title,
                "Picked random similar movie"
            ),
            None => tracing::debug!(seed_movie_id = movie_id, "No similar movies found"),
        }

        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_json(ids: &[i32]) -> TmdbListResponse {
        let results: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "title": format!("Movie {}", id),
                    "original_language": "en",
                    "popularity": 10.0,
                    "adult": false,
                    "genre_ids": [18]
                })
            })
            .collect();

        serde_json::from_value(serde_json::json!({
            "results": results,
            "total_pages": 42
        }))
        .unwrap()
    }

    #[test]
    fn test_pick_random_entry_empty_listing() {
        let listing = listing_json(&[]);
        assert_eq!(pick_random_entry(listing), None);
    }

    #[test]
    fn test_pick_random_entry_single() {
        let listing = listing_json(&[603]);
        let picked = pick_random_entry(listing).unwrap();
        assert_eq!(picked.id, 603);
        assert_eq!(picked.title, "Movie 603");
    }

    #[test]
    fn test_pick_random_entry_is_member() {
        let ids = [1, 2, 3, 4, 5];
        for _ in 0..20 {
            let picked = pick_random_entry(listing_json(&ids)).unwrap();
            assert!(ids.contains(&picked.id));
        }
    }

    #[test]
    fn test_listing_deserialization() {
        let json = r#"{
            "page": 1,
            "results": [
                {"id": 278, "title": "The Shawshank Redemption", "popularity": 88.3, "genre_ids": [18, 80]},
                {"id": 238, "title": "The Godfather", "popularity": 76.2, "genre_ids": [18, 80]}
            ],
            "total_pages": 500,
            "total_results": 10000
        }"#;

        let listing: TmdbListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(listing.results.len(), 2);
        assert_eq!(listing.results[0].id, 278);
        assert_eq!(listing.total_pages, 500);
    }
}

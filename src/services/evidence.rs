use serde::Serialize;

use crate::{
    error::{AppResult, RecommendError},
    models::{FeedbackEvent, GenreRef, MovieDetails},
    services::{candidates::CandidateSet, catalog::CatalogGateway},
    store::EvidenceStore,
};

/// A movie the user rated, with its genres and the verdict
#[derive(Debug, Clone, Serialize)]
pub struct RatedMovie {
    #[serde(flatten)]
    pub details: MovieDetails,
    pub liked: bool,
}

/// The structured bundle sent to the scoring oracle
///
/// Built once per personalized request and dropped right after the oracle
/// call; nothing in it outlives the request.
#[derive(Debug, Clone, Serialize)]
pub struct EvidencePackage {
    pub favorite_genres: Vec<GenreRef>,
    pub feedback_history: Vec<RatedMovie>,
    pub candidates: Vec<MovieDetails>,
}

/// Builds the evidence package for a personalized recommendation
///
/// Resolves every feedback movie and every candidate to a full record with
/// genres, iterating in input order so serialized payloads are reproducible.
/// Fails with `InsufficientData` when the candidate set is empty or no
/// candidate resolves to a usable record; that is the gate deciding that the
/// caller must not personalize.
pub async fn package(
    store: &dyn EvidenceStore,
    catalog: &dyn CatalogGateway,
    user_id: i32,
    feedback: &[FeedbackEvent],
    favorite_genres: Vec<GenreRef>,
    candidates: &CandidateSet,
) -> AppResult<EvidencePackage> {
    if candidates.is_empty() {
        return Err(RecommendError::InsufficientData.into());
    }

    let mut feedback_history = Vec::with_capacity(feedback.len());
    for event in feedback {
        match resolve_movie(store, catalog, event.movie_id).await? {
            Some(details) => feedback_history.push(RatedMovie {
                details,
                liked: event.liked,
            }),
            None => {
                tracing::warn!(
                    user_id = user_id,
                    movie_id = event.movie_id,
                    "Feedback movie could not be resolved, omitting from evidence"
                );
            }
        }
    }

    let mut resolved_candidates = Vec::with_capacity(candidates.len());
    for &movie_id in candidates.ids() {
        match resolve_movie(store, catalog, movie_id).await? {
            Some(details) => resolved_candidates.push(details),
            None => {
                tracing::warn!(
                    user_id = user_id,
                    movie_id = movie_id,
                    "Candidate could not be resolved, omitting from evidence"
                );
            }
        }
    }

    if resolved_candidates.is_empty() {
        tracing::warn!(
            user_id = user_id,
            candidate_count = candidates.len(),
            "No candidate resolved to a usable record"
        );
        return Err(RecommendError::InsufficientData.into());
    }

    tracing::info!(
        user_id = user_id,
        history = feedback_history.len(),
        candidates = resolved_candidates.len(),
        "Evidence package built"
    );

    Ok(EvidencePackage {
        favorite_genres,
        feedback_history,
        candidates: resolved_candidates,
    })
}

/// Resolves a movie id to a record with genres, store first, catalog on miss
///
/// A catalog fetch that succeeds is persisted before returning: the movie
/// row (idempotent insert) and, only when the movie has no associations yet,
/// its genre links. Catalog misses and transport failures resolve to `None`;
/// store failures propagate.
pub async fn resolve_movie(
    store: &dyn EvidenceStore,
    catalog: &dyn CatalogGateway,
    movie_id: i32,
) -> AppResult<Option<MovieDetails>> {
    if store.movie_exists(movie_id).await? {
        let Some(movie) = store.movie_by_id(movie_id).await? else {
            return Ok(None);
        };
        let genres = store.genres_for_movie(movie_id).await?;
        return Ok(Some(MovieDetails { movie, genres }));
    }

    let details = match catalog.movie_details(movie_id).await {
        Ok(Some(details)) => details,
        Ok(None) => return Ok(None),
        Err(e) => {
            tracing::warn!(movie_id = movie_id, error = %e, "Movie detail lookup failed");
            return Ok(None);
        }
    };

    store.store_movie(&details.movie).await?;

    if !store.movie_has_genres(movie_id).await? {
        let genre_ids: Vec<i32> = details.genres.iter().map(|g| g.id).collect();
        store.store_movie_genres(movie_id, &genre_ids).await?;
    }

    Ok(Some(details))
}

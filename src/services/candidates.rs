use std::collections::HashSet;

use crate::{models::FeedbackEvent, services::catalog::CatalogGateway};

/// Ordered, duplicate-free set of candidate movie ids
///
/// Built fresh for each recommendation request and discarded after use. The
/// vector preserves collection order for deterministic downstream payloads;
/// the set backs the first-seen-wins dedup rule.
#[derive(Debug, Default)]
pub struct CandidateSet {
    ids: Vec<i32>,
    seen: HashSet<i32>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a movie id, returning false when it was already present.
    /// Later duplicates never displace the first occurrence.
    pub fn insert(&mut self, movie_id: i32) -> bool {
        if self.seen.insert(movie_id) {
            self.ids.push(movie_id);
            true
        } else {
            false
        }
    }

    /// Candidate ids in collection order
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Assembles a candidate set from a user's feedback history
///
/// Each liked movie contributes one similar-movie lookup; each disliked
/// movie contributes one random fallback to keep the pool diverse. Lookups
/// run sequentially so the first-seen dedup is deterministic. A failed
/// lookup for one feedback item is logged and skipped; partial results are
/// acceptable and an empty set is a valid outcome the caller decides on.
pub async fn assemble(
    catalog: &dyn CatalogGateway,
    user_id: i32,
    feedback: &[FeedbackEvent],
) -> CandidateSet {
    let mut candidates = CandidateSet::new();

    for event in feedback {
        let lookup = if event.liked {
            catalog.random_similar_movie(event.movie_id).await
        } else {
            catalog.random_movie().await
        };

        match lookup {
            Ok(Some(movie)) => {
                if !candidates.insert(movie.id) {
                    tracing::debug!(
                        movie_id = movie.id,
                        "Duplicate candidate dropped"
                    );
                }
            }
            Ok(None) => {
                tracing::warn!(
                    user_id = user_id,
                    seed_movie_id = event.movie_id,
                    liked = event.liked,
                    "Candidate lookup returned nothing"
                );
            }
            Err(e) => {
                tracing::warn!(
                    user_id = user_id,
                    seed_movie_id = event.movie_id,
                    liked = event.liked,
                    error = %e,
                    "Candidate lookup failed, continuing with remaining feedback"
                );
            }
        }
    }

    tracing::info!(
        user_id = user_id,
        feedback_count = feedback.len(),
        candidate_count = candidates.len(),
        "Candidate assembly completed"
    );

    candidates
}

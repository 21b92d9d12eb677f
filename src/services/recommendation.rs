use std::sync::Arc;

use crate::{
    error::{AppResult, RecommendError},
    models::{FeedbackEvent, MovieRecord},
    services::{candidates, catalog::CatalogGateway, evidence, oracle::ScoringOracle},
    store::EvidenceStore,
};

/// Top-level recommendation orchestrator
///
/// Decides between the cold-start and personalized flows, enforces the
/// no-repeat invariant against the recommendation log, and consumes the
/// user's feedback once a personalized cycle completes. Callers must
/// serialize concurrent requests for the same user (the invariant check and
/// the feedback clear are not atomic with the oracle call); distinct users
/// can run fully in parallel.
pub struct Recommender {
    store: Arc<dyn EvidenceStore>,
    catalog: Arc<dyn CatalogGateway>,
    oracle: Arc<dyn ScoringOracle>,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        catalog: Arc<dyn CatalogGateway>,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        Self {
            store,
            catalog,
            oracle,
        }
    }

    /// Produces the single next movie for a user
    pub async fn produce_recommendation(&self, user_id: i32) -> AppResult<MovieRecord> {
        let feedback = self.store.feedback_for_user(user_id).await?;

        if feedback.is_empty() {
            tracing::info!(user_id = user_id, "No feedback history, cold-start flow");
            self.cold_start(user_id).await
        } else {
            tracing::info!(
                user_id = user_id,
                feedback_count = feedback.len(),
                "Feedback available, personalized flow"
            );
            self.personalized(user_id, feedback).await
        }
    }

    /// Cold-start flow: one random catalog pick, no feedback consumed
    async fn cold_start(&self, user_id: i32) -> AppResult<MovieRecord> {
        let Some(movie) = self.catalog.random_movie().await? else {
            return Err(RecommendError::NoCandidateAvailable.into());
        };

        if movie.id <= 0 {
            tracing::warn!(user_id = user_id, "Random pick carried no usable id");
            return Err(RecommendError::NoCandidateAvailable.into());
        }

        if self.store.already_recommended(user_id, movie.id).await? {
            // No automatic reroll; the caller decides whether to retry with
            // a fresh seed, which keeps retry storms impossible here
            return Err(RecommendError::AlreadyRecommended {
                user_id,
                movie_id: movie.id,
            }
            .into());
        }

        let resolved = match evidence::resolve_movie(
            self.store.as_ref(),
            self.catalog.as_ref(),
            movie.id,
        )
        .await?
        {
            Some(details) => details.movie,
            None => {
                // The listing just returned this movie, so a failed details
                // lookup still leaves us a usable record to store and serve
                self.store.store_movie(&movie).await?;
                movie
            }
        };

        self.persist_recommendation(user_id, resolved.id, false)
            .await?;

        tracing::info!(
            user_id = user_id,
            movie_id = resolved.id,
            "Cold-start recommendation produced"
        );

        Ok(resolved)
    }

    /// Personalized flow: assemble, package, score, persist, consume
    async fn personalized(
        &self,
        user_id: i32,
        feedback: Vec<FeedbackEvent>,
    ) -> AppResult<MovieRecord> {
        let candidates = candidates::assemble(self.catalog.as_ref(), user_id, &feedback).await;
        if candidates.is_empty() {
            return Err(RecommendError::NoCandidates.into());
        }

        let favorite_genres = self.store.preferred_genres(user_id).await?;

        // InsufficientData fails the cycle outright; falling back to a
        // random pick is the caller's call, not an implicit one
        let package = evidence::package(
            self.store.as_ref(),
            self.catalog.as_ref(),
            user_id,
            &feedback,
            favorite_genres,
            &candidates,
        )
        .await?;

        let ranked = self.oracle.score_ranked(user_id, &package).await?;
        drop(package);

        let Some(&(chosen_id, score)) = ranked.first() else {
            return Err(RecommendError::OracleUnavailable(
                "oracle returned zero recommendations".to_string(),
            )
            .into());
        };

        tracing::info!(
            user_id = user_id,
            movie_id = chosen_id,
            score = score,
            "Oracle selected a movie"
        );

        let resolved = match evidence::resolve_movie(
            self.store.as_ref(),
            self.catalog.as_ref(),
            chosen_id,
        )
        .await?
        {
            Some(details) => details.movie,
            None => {
                return Err(RecommendError::OracleUnavailable(format!(
                    "chosen movie {} could not be resolved",
                    chosen_id
                ))
                .into())
            }
        };

        self.persist_recommendation(user_id, chosen_id, true).await?;

        tracing::info!(
            user_id = user_id,
            movie_id = chosen_id,
            "Personalized recommendation produced"
        );

        Ok(resolved)
    }

    /// Persisting state: re-check the no-repeat invariant, append to the
    /// log, and consume feedback on the personalized path
    ///
    /// The insert and the clear are both attempted even when one fails; a
    /// failed clear after a successful insert is logged as a persistence
    /// failure and does not roll back the recommendation; reprocessing the
    /// feedback next cycle is the accepted cost.
    async fn persist_recommendation(
        &self,
        user_id: i32,
        movie_id: i32,
        consume_feedback: bool,
    ) -> AppResult<()> {
        if self.store.already_recommended(user_id, movie_id).await? {
            return Err(RecommendError::AlreadyRecommended { user_id, movie_id }.into());
        }

        let inserted = self.store.insert_recommendation(user_id, movie_id).await;

        if consume_feedback {
            match self.store.clear_feedback(user_id).await {
                Ok(cleared) => {
                    tracing::debug!(
                        user_id = user_id,
                        cleared = cleared,
                        "Feedback consumed after recommendation"
                    );
                }
                Err(e) => {
                    // Persistence failure, reported but not rolled back
                    tracing::error!(
                        user_id = user_id,
                        movie_id = movie_id,
                        error = %e,
                        "Feedback clear failed after recommendation insert"
                    );
                }
            }
        }

        match inserted {
            Ok(true) => Ok(()),
            Ok(false) => Err(RecommendError::PersistenceFailure(
                "recommendation insert affected no rows".to_string(),
            )
            .into()),
            Err(e) => Err(RecommendError::PersistenceFailure(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::GenreRef;
    use crate::services::catalog::MockCatalogGateway;
    use crate::services::oracle::MockScoringOracle;
    use crate::store::MockEvidenceStore;
    use mockall::predicate::eq;

    fn movie(id: i32) -> MovieRecord {
        MovieRecord {
            id,
            title: format!("Movie {}", id),
            release_date: Some("2015-06-01".to_string()),
            original_language: "en".to_string(),
            popularity: 9.5,
            adult: false,
            overview: None,
            poster_path: None,
        }
    }

    fn feedback(movie_id: i32, liked: bool) -> FeedbackEvent {
        FeedbackEvent {
            user_id: 1,
            movie_id,
            liked,
        }
    }

    /// Marks a movie as already present in the store with no genres
    fn stored(store: &mut MockEvidenceStore, id: i32) {
        store
            .expect_movie_exists()
            .with(eq(id))
            .returning(|_| Ok(true));
        store
            .expect_movie_by_id()
            .with(eq(id))
            .returning(|id| Ok(Some(movie(id))));
        store
            .expect_genres_for_movie()
            .with(eq(id))
            .returning(|_| {
                Ok(vec![GenreRef {
                    id: 28,
                    name: "Action".to_string(),
                }])
            });
    }

    fn recommender(
        store: MockEvidenceStore,
        catalog: MockCatalogGateway,
        oracle: MockScoringOracle,
    ) -> Recommender {
        Recommender::new(Arc::new(store), Arc::new(catalog), Arc::new(oracle))
    }

    #[tokio::test]
    async fn test_empty_feedback_takes_cold_start_and_skips_oracle() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .with(eq(1))
            .returning(|_| Ok(vec![]));
        catalog
            .expect_random_movie()
            .times(1)
            .returning(|| Ok(Some(movie(55))));
        store
            .expect_already_recommended()
            .with(eq(1), eq(55))
            .returning(|_, _| Ok(false));
        stored(&mut store, 55);
        store
            .expect_insert_recommendation()
            .with(eq(1), eq(55))
            .times(1)
            .returning(|_, _| Ok(true));

        // Cold start never touches the evidence or oracle machinery
        oracle.expect_score_ranked().times(0);
        store.expect_clear_feedback().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await
            .unwrap();

        assert_eq!(result.id, 55);
    }

    #[tokio::test]
    async fn test_cold_start_no_random_movie_available() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let oracle = MockScoringOracle::new();

        store.expect_feedback_for_user().returning(|_| Ok(vec![]));
        catalog.expect_random_movie().returning(|| Ok(None));

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::NoCandidateAvailable))
        ));
    }

    #[tokio::test]
    async fn test_cold_start_repeat_is_rejected_without_reroll() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let oracle = MockScoringOracle::new();

        store.expect_feedback_for_user().returning(|_| Ok(vec![]));
        catalog
            .expect_random_movie()
            .times(1)
            .returning(|| Ok(Some(movie(55))));
        store
            .expect_already_recommended()
            .with(eq(1), eq(55))
            .returning(|_, _| Ok(true));
        store.expect_insert_recommendation().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::AlreadyRecommended {
                user_id: 1,
                movie_id: 55
            }))
        ));
    }

    #[tokio::test]
    async fn test_personalized_full_cycle() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .with(eq(1))
            .returning(|_| Ok(vec![feedback(42, true), feedback(7, false)]));

        // Liked 42 yields similar movie 100, disliked 7 yields fallback 200
        catalog
            .expect_random_similar_movie()
            .with(eq(42))
            .returning(|_| Ok(Some(movie(100))));
        catalog
            .expect_random_movie()
            .returning(|| Ok(Some(movie(200))));

        store
            .expect_preferred_genres()
            .with(eq(1))
            .returning(|_| Ok(vec![]));
        stored(&mut store, 42);
        stored(&mut store, 7);
        stored(&mut store, 100);
        stored(&mut store, 200);

        oracle
            .expect_score_ranked()
            .withf(|user_id, package| *user_id == 1 && package.candidates.len() == 2)
            .times(1)
            .returning(|_, _| Ok(vec![(100, 0.87)]));

        store
            .expect_already_recommended()
            .with(eq(1), eq(100))
            .returning(|_, _| Ok(false));
        store
            .expect_insert_recommendation()
            .with(eq(1), eq(100))
            .times(1)
            .returning(|_, _| Ok(true));
        store
            .expect_clear_feedback()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(true));

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await
            .unwrap();

        assert_eq!(result.id, 100);
    }

    #[tokio::test]
    async fn test_personalized_empty_candidate_set_writes_nothing() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .returning(|_| Ok(vec![feedback(42, true)]));
        catalog
            .expect_random_similar_movie()
            .returning(|_| Err(AppError::ExternalApi("down".to_string())));
        store.expect_insert_recommendation().times(0);
        store.expect_clear_feedback().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::NoCandidates))
        ));
    }

    #[tokio::test]
    async fn test_personalized_insufficient_data_fails_without_fallback() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .returning(|_| Ok(vec![feedback(42, true)]));
        catalog
            .expect_random_similar_movie()
            .returning(|_| Ok(Some(movie(100))));
        store.expect_preferred_genres().returning(|_| Ok(vec![]));

        // Nothing resolves: not stored locally, catalog details all miss
        store.expect_movie_exists().returning(|_| Ok(false));
        catalog.expect_movie_details().returning(|_| Ok(None));

        oracle.expect_score_ranked().times(0);
        store.expect_insert_recommendation().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::InsufficientData))
        ));
    }

    #[tokio::test]
    async fn test_empty_oracle_reply_maps_to_unavailable() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .returning(|_| Ok(vec![feedback(42, true)]));
        catalog
            .expect_random_similar_movie()
            .returning(|_| Ok(Some(movie(100))));
        store.expect_preferred_genres().returning(|_| Ok(vec![]));
        stored(&mut store, 42);
        stored(&mut store, 100);

        oracle.expect_score_ranked().returning(|_, _| Ok(vec![]));
        store.expect_insert_recommendation().times(0);
        store.expect_clear_feedback().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::OracleUnavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_failed_clear_after_insert_still_returns_movie() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .returning(|_| Ok(vec![feedback(42, true)]));
        catalog
            .expect_random_similar_movie()
            .returning(|_| Ok(Some(movie(100))));
        store.expect_preferred_genres().returning(|_| Ok(vec![]));
        stored(&mut store, 42);
        stored(&mut store, 100);

        oracle
            .expect_score_ranked()
            .returning(|_, _| Ok(vec![(100, 0.5)]));

        store
            .expect_already_recommended()
            .returning(|_, _| Ok(false));
        store
            .expect_insert_recommendation()
            .times(1)
            .returning(|_, _| Ok(true));
        store
            .expect_clear_feedback()
            .times(1)
            .returning(|_| Err(AppError::Internal("connection lost".to_string())));

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await
            .unwrap();

        assert_eq!(result.id, 100);
    }

    #[tokio::test]
    async fn test_persisting_recheck_catches_concurrent_duplicate() {
        let mut store = MockEvidenceStore::new();
        let mut catalog = MockCatalogGateway::new();
        let mut oracle = MockScoringOracle::new();

        store
            .expect_feedback_for_user()
            .returning(|_| Ok(vec![feedback(42, true)]));
        catalog
            .expect_random_similar_movie()
            .returning(|_| Ok(Some(movie(100))));
        store.expect_preferred_genres().returning(|_| Ok(vec![]));
        stored(&mut store, 42);
        stored(&mut store, 100);

        oracle
            .expect_score_ranked()
            .returning(|_, _| Ok(vec![(100, 0.5)]));

        // A concurrent cycle for the same user won the race
        store
            .expect_already_recommended()
            .with(eq(1), eq(100))
            .returning(|_, _| Ok(true));
        store.expect_insert_recommendation().times(0);

        let result = recommender(store, catalog, oracle)
            .produce_recommendation(1)
            .await;

        assert!(matches!(
            result,
            Err(AppError::Recommend(RecommendError::AlreadyRecommended {
                user_id: 1,
                movie_id: 100
            }))
        ));
    }
}

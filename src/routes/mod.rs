use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::request_id::{attach_request_id, span_for_request},
    services::{catalog::CatalogGateway, oracle::ScoringOracle, recommendation::Recommender},
    store::EvidenceStore,
};

pub mod feedback;
pub mod recommendations;

/// Shared application state
///
/// The three trait objects are the seams tests substitute; the lock map
/// serializes recommendation cycles per user.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EvidenceStore>,
    pub catalog: Arc<dyn CatalogGateway>,
    pub oracle: Arc<dyn ScoringOracle>,
    user_locks: Arc<Mutex<HashMap<i32, Arc<Mutex<()>>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        catalog: Arc<dyn CatalogGateway>,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        Self {
            store,
            catalog,
            oracle,
            user_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn recommender(&self) -> Recommender {
        Recommender::new(
            self.store.clone(),
            self.catalog.clone(),
            self.oracle.clone(),
        )
    }

    /// Lock serializing recommendation cycles for one user; distinct
    /// users proceed in parallel
    pub async fn user_lock(&self, user_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Removes a user's lock entry once no request holds it, keeping the
    /// map bounded by in-flight users rather than all users ever seen
    pub async fn evict_user_lock(&self, user_id: i32) {
        let mut locks = self.user_locks.lock().await;
        if locks
            .get(&user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&user_id);
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(span_for_request))
        .layer(from_fn(attach_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(feedback::submit))
        .route("/users/:user_id/feedback", get(feedback::list_for_user))
        .route(
            "/users/:user_id/recommendations",
            get(recommendations::list_for_user).post(recommendations::recommend),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogGateway;
    use crate::services::oracle::MockScoringOracle;
    use crate::store::MockEvidenceStore;

    fn empty_state() -> AppState {
        AppState::new(
            Arc::new(MockEvidenceStore::new()),
            Arc::new(MockCatalogGateway::new()),
            Arc::new(MockScoringOracle::new()),
        )
    }

    #[tokio::test]
    async fn test_same_user_gets_same_lock() {
        let state = empty_state();
        let first = state.user_lock(7).await;
        let second = state.user_lock(7).await;
        assert!(Arc::ptr_eq(&first, &second));

        let other = state.user_lock(8).await;
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_user_lock_evicted_only_after_release() {
        let state = empty_state();
        let lock = state.user_lock(7).await;
        let guard = lock.lock().await;

        // Held by an in-flight request, so the entry survives eviction
        state.evict_user_lock(7).await;
        assert!(state.user_locks.lock().await.contains_key(&7));

        drop(guard);
        drop(lock);
        state.evict_user_lock(7).await;
        assert!(!state.user_locks.lock().await.contains_key(&7));
    }
}

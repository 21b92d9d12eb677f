use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppResult, RecommendError},
    services::evidence::EvidencePackage,
};

/// External ranking service, treated as an opaque black box
///
/// One request per recommendation cycle; any non-success status or
/// malformed reply is a hard `OracleUnavailable` with no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Ranked (movie id, score) pairs, best first, in reply order.
    /// A reply without the ranking field yields an empty vector.
    async fn score_ranked(
        &self,
        user_id: i32,
        evidence: &EvidencePackage,
    ) -> AppResult<Vec<(i32, f64)>>;

    /// The single best-scored movie id, if the oracle returned any
    async fn score(&self, user_id: i32, evidence: &EvidencePackage) -> AppResult<Option<i32>> {
        let ranked = self.score_ranked(user_id, evidence).await?;
        Ok(ranked.first().map(|(movie_id, _)| *movie_id))
    }
}

/// Request body for the oracle's scoring endpoint
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    user: i32,
    evidence: &'a EvidencePackage,
}

/// Reply shape: either a scalar chosen id or a ranked list of pairs
#[derive(Debug, Deserialize)]
struct ScoreReply {
    #[serde(default)]
    recommended_movie: Option<i32>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    all_recommendations: Option<Vec<(i32, f64)>>,
}

/// Interprets an oracle reply body
///
/// Pairs are read positionally and their order preserved. An absent
/// ranking field with no scalar fallback is zero recommendations, not an
/// error; an undecodable body is.
fn parse_reply(body: &str) -> Result<Vec<(i32, f64)>, RecommendError> {
    let reply: ScoreReply = serde_json::from_str(body)
        .map_err(|e| RecommendError::OracleUnavailable(format!("malformed reply: {}", e)))?;

    if let Some(ranked) = reply.all_recommendations {
        return Ok(ranked);
    }

    Ok(reply
        .recommended_movie
        .map(|movie_id| vec![(movie_id, reply.score.unwrap_or(0.0))])
        .unwrap_or_default())
}

/// HTTP adapter for the scoring oracle
#[derive(Clone)]
pub struct HttpScoringOracle {
    http_client: HttpClient,
    api_url: String,
    api_key: Option<String>,
}

impl HttpScoringOracle {
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    async fn score_ranked(
        &self,
        user_id: i32,
        evidence: &EvidencePackage,
    ) -> AppResult<Vec<(i32, f64)>> {
        let url = format!("{}/score", self.api_url);
        let request = ScoreRequest {
            user: user_id,
            evidence,
        };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            RecommendError::OracleUnavailable(format!("transport error: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                user_id = user_id,
                status = %status,
                body = %body,
                "Scoring oracle returned an error"
            );
            return Err(
                RecommendError::OracleUnavailable(format!("status {}: {}", status, body)).into(),
            );
        }

        let body = response.text().await.map_err(|e| {
            RecommendError::OracleUnavailable(format!("unreadable reply: {}", e))
        })?;

        let ranked = parse_reply(&body)?;

        tracing::info!(
            user_id = user_id,
            recommendations = ranked.len(),
            "Scoring oracle replied"
        );

        Ok(ranked)
    }
}

//! Client for the remote matchmaking service.

use crate::config::GameMode;
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// A matched opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchData {
    /// Opponent display name.
    pub opponent: String,
    /// Server-side match identifier.
    pub match_id: String,
}

/// Envelope returned by `GET /match`.
#[derive(Debug, Clone, Deserialize)]
struct MatchResponse {
    code: i64,
    msg: String,
    data: Option<MatchData>,
}

/// Matchmaking failure, carrying a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Matchmaking failed: {message}")]
pub struct MatchError {
    /// What went wrong.
    pub message: String,
}

impl MatchError {
    /// Creates a matchmaking error.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(error_message = %message, "Matchmaking error");
        Self { message }
    }
}

/// Finds an opponent for a game mode.
#[async_trait]
pub trait Matchmaker: Send + Sync {
    /// Requests a match for `mode`.
    async fn find_match(&self, mode: GameMode) -> Result<MatchData, MatchError>;
}

/// [`Matchmaker`] backed by the HTTP matchmaking API.
#[derive(Debug, Clone)]
pub struct HttpMatchmaker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMatchmaker {
    /// Creates a client for the service at `base_url`.
    #[instrument]
    pub fn new(base_url: impl Into<String> + std::fmt::Debug) -> Result<Self, MatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| MatchError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Matchmaker for HttpMatchmaker {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn find_match(&self, mode: GameMode) -> Result<MatchData, MatchError> {
        // Mode names are plain SCREAMING_SNAKE_CASE, no escaping needed.
        let url = format!("{}/match?mode={}", self.base_url, mode.as_ref());
        debug!(url = %url, "Requesting match");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MatchError::new(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchError::new(format!(
                "Network request failed: {}",
                status.as_u16()
            )));
        }

        let body: MatchResponse = response
            .json()
            .await
            .map_err(|e| MatchError::new(format!("Invalid response: {}", e)))?;

        match body {
            MatchResponse {
                code: 200,
                data: Some(data),
                ..
            } => {
                info!(opponent = %data.opponent, match_id = %data.match_id, "Match found");
                Ok(data)
            }
            MatchResponse { msg, .. } if !msg.is_empty() => Err(MatchError::new(msg)),
            _ => Err(MatchError::new("Match failed")),
        }
    }
}

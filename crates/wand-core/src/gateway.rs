//! Remote service contracts
//!
//! Gateways are constructed once and injected into each session. The core
//! never reaches for a global client.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wand_sketch::TopicMix;

/// Review → best matching story line
pub type BestMatches = BTreeMap<String, String>;

/// Review → (story line → score) for lines above the review's threshold
pub type ReviewScores = BTreeMap<String, BTreeMap<String, f64>>;

/// A single generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text to continue
    pub prompt: String,
    /// Topic mix to steer towards; may be empty
    pub topic_weights: TopicMix,
}

impl GenerationRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(prompt: impl Into<String>, topic_weights: TopicMix) -> Self {
        Self {
            prompt: prompt.into(),
            topic_weights,
        }
    }
}

/// Text generation service
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Generate one sentence continuing `request.prompt`
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GatewayError>;
}

/// Critic/scoring request
#[derive(Debug, Clone, PartialEq)]
pub enum CriticRequest {
    /// For each review, the single best matching line
    BestMatch {
        /// Candidate lines
        stories: Vec<String>,
        /// Reviews to match
        reviews: Vec<String>,
    },
    /// For each review, every line scoring above its threshold
    Scores {
        /// Candidate lines
        stories: Vec<String>,
        /// Review → minimum score
        reviews: BTreeMap<String, f64>,
    },
}

impl CriticRequest {
    /// Wire protocol version of this request kind
    #[inline]
    #[must_use]
    pub fn version(&self) -> u8 {
        match self {
            Self::BestMatch { .. } => 1,
            Self::Scores { .. } => 2,
        }
    }

    /// Candidate lines
    #[inline]
    #[must_use]
    pub fn stories(&self) -> &[String] {
        match self {
            Self::BestMatch { stories, .. } | Self::Scores { stories, .. } => stories,
        }
    }
}

/// Critic/scoring response, matching the request kind
#[derive(Debug, Clone, PartialEq)]
pub enum CriticResponse {
    /// Answer to [`CriticRequest::BestMatch`]
    BestMatch(BestMatches),
    /// Answer to [`CriticRequest::Scores`]
    Scores(ReviewScores),
}

/// Content matching / scoring service
#[async_trait]
pub trait CriticGateway: Send + Sync {
    /// Score reviews against story lines
    async fn critique(&self, request: &CriticRequest) -> Result<CriticResponse, GatewayError>;
}

/// Critic used when no scoring service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCritic;

#[async_trait]
impl CriticGateway for NoCritic {
    async fn critique(&self, _request: &CriticRequest) -> Result<CriticResponse, GatewayError> {
        Err(GatewayError::Unavailable("no critic service configured".into()))
    }
}

/// Ask for best matches, rejecting a mismatched response kind
///
/// # Errors
/// Gateway failures, or `GatewayError::Decode` for a wrong response kind.
pub async fn best_matches(
    critic: &dyn CriticGateway,
    stories: Vec<String>,
    reviews: Vec<String>,
) -> Result<BestMatches, GatewayError> {
    match critic
        .critique(&CriticRequest::BestMatch { stories, reviews })
        .await?
    {
        CriticResponse::BestMatch(matches) => Ok(matches),
        CriticResponse::Scores(_) => Err(GatewayError::Decode(
            "expected best-match response, got scores".into(),
        )),
    }
}

/// Ask for scores, rejecting a mismatched response kind
///
/// # Errors
/// Gateway failures, or `GatewayError::Decode` for a wrong response kind.
pub async fn review_scores(
    critic: &dyn CriticGateway,
    stories: Vec<String>,
    reviews: BTreeMap<String, f64>,
) -> Result<ReviewScores, GatewayError> {
    match critic
        .critique(&CriticRequest::Scores { stories, reviews })
        .await?
    {
        CriticResponse::Scores(scores) => Ok(scores),
        CriticResponse::BestMatch(_) => Err(GatewayError::Decode(
            "expected scores response, got best matches".into(),
        )),
    }
}

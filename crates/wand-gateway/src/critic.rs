//! Critic service client
//!
//! Version 1 asks for the best line per review, version 2 for every line
//! above a per-review threshold. The answer shape follows the version.

use crate::client::JsonEndpoint;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use wand_core::{
    BestMatches, CriticGateway, CriticRequest, CriticResponse, GatewayConfig, GatewayError,
    ReviewScores,
};

/// Reviews as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireReviews<'a> {
    /// Plain list (version 1)
    List(&'a [String]),
    /// Review → threshold (version 2)
    Thresholds(&'a BTreeMap<String, f64>),
}

/// Wire body of a critic call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticPayload<'a> {
    /// Candidate lines
    pub stories: &'a [String],
    /// Reviews to score
    pub reviews: WireReviews<'a>,
    /// Interface version
    pub version: u8,
}

impl<'a> From<&'a CriticRequest> for CriticPayload<'a> {
    fn from(request: &'a CriticRequest) -> Self {
        let reviews = match request {
            CriticRequest::BestMatch { reviews, .. } => WireReviews::List(reviews),
            CriticRequest::Scores { reviews, .. } => WireReviews::Thresholds(reviews),
        };
        Self {
            stories: request.stories(),
            reviews,
            version: request.version(),
        }
    }
}

/// [`CriticGateway`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpCriticGateway {
    endpoint: JsonEndpoint,
}

impl HttpCriticGateway {
    /// Client for `url`
    ///
    /// # Errors
    /// `GatewayError::Request` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
        })
    }

    /// Client for the configured critic endpoint
    ///
    /// # Errors
    /// See [`HttpCriticGateway::new`].
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.critic_url.clone(), config.timeout())
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        self.endpoint.url()
    }
}

#[async_trait]
impl CriticGateway for HttpCriticGateway {
    async fn critique(&self, request: &CriticRequest) -> Result<CriticResponse, GatewayError> {
        let payload = CriticPayload::from(request);
        match request {
            CriticRequest::BestMatch { .. } => {
                let matches: BestMatches = self.endpoint.post(&payload).await?;
                Ok(CriticResponse::BestMatch(matches))
            }
            CriticRequest::Scores { .. } => {
                let scores: ReviewScores = self.endpoint.post(&payload).await?;
                Ok(CriticResponse::Scores(scores))
            }
        }
    }
}

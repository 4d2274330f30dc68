//! Generation service client

use crate::client::JsonEndpoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use wand_core::{GatewayConfig, GatewayError, GenerationGateway, GenerationRequest};

/// Wire body of a generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPayload<'a> {
    /// Model skill selector; always 0
    pub skill: u8,
    /// Text to continue
    pub sentence: &'a str,
    /// Topic → weight
    pub topic: &'a BTreeMap<String, f64>,
    /// Task name; always `"generation"`
    pub task: &'static str,
}

impl<'a> From<&'a GenerationRequest> for GenerationPayload<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            skill: 0,
            sentence: &request.prompt,
            topic: &request.topic_weights,
            task: "generation",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationAnswer {
    out_sentence: String,
}

/// [`GenerationGateway`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpGenerationGateway {
    endpoint: JsonEndpoint,
}

impl HttpGenerationGateway {
    /// Client for `url`
    ///
    /// # Errors
    /// `GatewayError::Request` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(url, timeout)?,
        })
    }

    /// Client for the configured generation endpoint
    ///
    /// # Errors
    /// See [`HttpGenerationGateway::new`].
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.generation_url.clone(), config.timeout())
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        self.endpoint.url()
    }
}

#[async_trait]
impl GenerationGateway for HttpGenerationGateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        let answer: GenerationAnswer = self
            .endpoint
            .post(&GenerationPayload::from(request))
            .await?;
        Ok(answer.out_sentence)
    }
}

//! Shared JSON-over-HTTP plumbing

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;
use wand_core::GatewayError;

/// Longest response body echoed back in a status error
const MAX_ERROR_BODY: usize = 512;

/// POSTs JSON bodies to one endpoint
#[derive(Debug, Clone)]
pub struct JsonEndpoint {
    client: Client,
    url: String,
}

impl JsonEndpoint {
    /// Endpoint at `url` with a per-request `timeout`
    ///
    /// # Errors
    /// `GatewayError::Request` if the client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Target URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` and decode the JSON answer
    ///
    /// # Errors
    /// `Request` for transport failures and timeouts, `Status` for non-2xx
    /// answers, `Decode` for bodies that do not match `R`.
    pub async fn post<B, R>(&self, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        debug!(url = %self.url, "gateway request");
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate(text),
            });
        }
        decode(&text)
    }
}

pub(crate) fn decode<R: DeserializeOwned>(text: &str) -> Result<R, GatewayError> {
    serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

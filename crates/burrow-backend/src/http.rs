//! Authenticated HTTPS JSON transport for API-speaking drivers

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{BackendError, Result};

pub struct ApiClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Protocol(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// GET a JSON document. `auth_header` is the full Authorization value
    /// (backends disagree on the scheme: Bearer vs PVEAPIToken).
    pub async fn get_json(
        &self,
        url: &str,
        auth_header: Option<&str>,
    ) -> Result<serde_json::Value> {
        let mut request = self.client.get(url);
        if let Some(value) = auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout)
            } else {
                BackendError::Unreachable(format!("request to {} failed: {}", url, e))
            }
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(BackendError::AuthFailed(format!(
                    "{} returned {}",
                    url,
                    response.status()
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(BackendError::EntityNotFound(url.to_string()));
            }
            status if !status.is_success() => {
                return Err(BackendError::Protocol(format!(
                    "{} returned {}",
                    url, status
                )));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("invalid JSON from {}: {}", url, e)))
    }
}

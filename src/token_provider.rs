use crate::errors::AppError;
use serde::Deserialize;
use std::time::Duration;

const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the Maskinporten-style token service.
///
/// One bearer token is issued per bank audience per aggregation request;
/// the core never caches tokens across requests (caching, if any, is the
/// token service's own concern).
#[derive(Clone)]
pub struct TokenProvider {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, token_endpoint: String, client_id: String) -> Self {
        Self {
            client,
            token_endpoint,
            client_id,
        }
    }

    /// Acquires an access token scoped to one bank's audience.
    pub async fn get_token(
        &self,
        environment: &str,
        scope: &str,
        audience: &str,
    ) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.token_endpoint)
            .timeout(Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("scope", scope),
                ("resource", audience),
                ("environment", environment),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout {
                        operation: "token acquisition".to_string(),
                    }
                } else {
                    AppError::Token(format!("Token request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Token(format!(
                "Token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Token(format!("Failed to parse token response: {}", e)))?;

        Ok(token.access_token)
    }
}

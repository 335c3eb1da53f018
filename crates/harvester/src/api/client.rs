//! HTTP client for the profile API
//!
//! One `reqwest::Client` shared by every component. All three endpoints
//! authenticate with the raw token in the `Authorization` header. A 401 is
//! surfaced as [`ApiOutcome::Unauthorized`] rather than an error: it is a
//! signal for the caller to refresh the token, never a fault.

use std::time::Duration;

use harvester_common::{HarvestError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::api::types::{DetailEnvelope, SearchRequest, SearchResponse};
use crate::config::HarvestConfig;

/// Outcome of an authenticated API call
#[derive(Debug)]
pub enum ApiOutcome<T> {
    Ok(T),
    Unauthorized,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

/// API client for the profile service
pub struct ProgClient {
    client: Client,
    token_url: String,
    api_base_url: String,
    seniority: Vec<String>,
    page_size: u32,
}

impl ProgClient {
    /// Create a new client from the pipeline configuration.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            seniority: config.seniority.clone(),
            page_size: config.page_size,
        })
    }

    /// Fetch a fresh bearer token from the auxiliary endpoint.
    ///
    /// One round trip, no retry; the caller owns the backoff policy.
    pub async fn fetch_token(&self) -> Result<String> {
        let response = self.client.get(&self.token_url).send().await?;

        if !response.status().is_success() {
            return Err(HarvestError::Upstream(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        Ok(body.token.trim().to_string())
    }

    /// Fetch one page of search results.
    pub async fn search_page(
        &self,
        page: u64,
        token: &str,
    ) -> Result<ApiOutcome<SearchResponse>> {
        let url = format!("{}/api/search/", self.api_base_url);
        let request = SearchRequest {
            page,
            seniority: self.seniority.clone(),
            size: self.page_size,
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(ApiOutcome::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(HarvestError::Upstream(format!(
                "search returned {} for page {}",
                response.status(),
                page
            )));
        }

        Ok(ApiOutcome::Ok(response.json().await?))
    }

    /// Fetch the full detail record for one profile.
    pub async fn fetch_profile(
        &self,
        profile_id: i64,
        token: &str,
    ) -> Result<ApiOutcome<DetailEnvelope>> {
        let url = format!("{}/api/candidates/{}", self.api_base_url, profile_id);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(ApiOutcome::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(HarvestError::Upstream(format!(
                "detail returned {} for profile {}",
                response.status(),
                profile_id
            )));
        }

        Ok(ApiOutcome::Ok(response.json().await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> HarvestConfig {
        let mut config = HarvestConfig::new("client-test");
        config.api_base_url = server.uri();
        config.token_url = format!("{}/token", server.uri());
        config
    }

    #[tokio::test]
    async fn test_fetch_token_trims_whitespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "  tok-1\n"})))
            .mount(&server)
            .await;

        let client = ProgClient::new(&test_config(&server)).unwrap();
        assert_eq!(client.fetch_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_fetch_token_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ProgClient::new(&test_config(&server)).unwrap();
        assert!(matches!(
            client.fetch_token().await,
            Err(HarvestError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_search_sends_filter_and_raw_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/"))
            .and(header("authorization", "tok-1"))
            .and(body_partial_json(json!({
                "page": 3,
                "seniority": ["Senior"],
                "size": 100
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProgClient::new(&test_config(&server)).unwrap();
        let outcome = client.search_page(3, "tok-1").await.unwrap();
        assert!(matches!(outcome, ApiOutcome::Ok(r) if r.results.is_empty()));
    }

    #[tokio::test]
    async fn test_search_401_is_a_signal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ProgClient::new(&test_config(&server)).unwrap();
        let outcome = client.search_page(0, "stale").await.unwrap();
        assert!(matches!(outcome, ApiOutcome::Unauthorized));
    }

    #[tokio::test]
    async fn test_fetch_profile_401_is_a_signal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/candidates/42"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ProgClient::new(&test_config(&server)).unwrap();
        let outcome = client.fetch_profile(42, "stale").await.unwrap();
        assert!(matches!(outcome, ApiOutcome::Unauthorized));
    }
}

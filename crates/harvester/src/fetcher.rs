//! Profile fetcher
//!
//! Retrieves the full detail record for one profile id. Pure read: same
//! transient-retry / explicit-401 split as the search cursor.

use std::sync::Arc;

use harvester_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::{ApiOutcome, DetailEnvelope, ProgClient};
use crate::retry::RetryPolicy;
use crate::token::{SharedToken, Token};

/// Outcome of fetching one profile detail
#[derive(Debug)]
pub enum FetchOutcome {
    Detail(DetailEnvelope),
    /// The token was rejected; carries the stale token for refresh.
    Unauthorized(Token),
}

/// Reader for the detail-by-id endpoint
pub struct ProfileFetcher {
    client: Arc<ProgClient>,
    token: Arc<SharedToken>,
    retry: RetryPolicy,
}

impl ProfileFetcher {
    pub fn new(client: Arc<ProgClient>, token: Arc<SharedToken>, retry: RetryPolicy) -> Self {
        Self {
            client,
            token,
            retry,
        }
    }

    /// Fetch the detail record for one profile.
    pub async fn fetch(
        &self,
        profile_id: i64,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let mut attempt = 0u32;

        loop {
            let token = self.token.current(cancel).await?;

            match self.client.fetch_profile(profile_id, &token.value).await {
                Ok(ApiOutcome::Unauthorized) => return Ok(FetchOutcome::Unauthorized(token)),
                Ok(ApiOutcome::Ok(envelope)) => return Ok(FetchOutcome::Detail(envelope)),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(HarvestError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(profile_id, attempt, error = %e, "profile request failed, retrying");
                    self.retry.pause(attempt - 1, cancel).await?;
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::HarvestConfig;
    use crate::token::TokenProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fetcher_for(server: &MockServer) -> ProfileFetcher {
        let mut config = HarvestConfig::new("fetcher-test");
        config.api_base_url = server.uri();
        config.token_url = format!("{}/token", server.uri());
        let client = Arc::new(ProgClient::new(&config).unwrap());
        let provider = TokenProvider::new(client.clone(), RetryPolicy::exponential(0, 3));
        let token = Arc::new(SharedToken::new(provider));

        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
            .mount(server)
            .await;

        ProfileFetcher::new(client, token, RetryPolicy::transient(0, 5))
    }

    #[tokio::test]
    async fn test_fetch_detail() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/candidates/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "profile": {"id": 11, "full_name": "Grace Hopper"}
            })))
            .mount(&server)
            .await;

        let outcome = fetcher.fetch(11, &CancellationToken::new()).await.unwrap();
        match outcome {
            FetchOutcome::Detail(envelope) => {
                assert_eq!(envelope.profile.unwrap().id, 11);
            },
            other => panic!("expected detail, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_error_then_detail() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/candidates/11"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/candidates/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "profile": {"id": 11}
            })))
            .mount(&server)
            .await;

        let outcome = fetcher.fetch(11, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Detail(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_is_returned_immediately() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/candidates/11"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher.fetch(11, &CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Unauthorized(_)));
    }
}

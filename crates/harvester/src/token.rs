//! Credential acquisition and the shared token cell
//!
//! The bearer token has no declared expiry: it is invalid until proven
//! otherwise, and staleness is only ever discovered on a 401. Acquisition
//! retries the auxiliary endpoint with exponential backoff up to a hard
//! ceiling; exceeding the ceiling is the pipeline's one fatal credential
//! condition.
//!
//! [`SharedToken`] is the single cross-task shared mutable value. Many
//! workers read it concurrently; whichever worker observes a 401 first
//! replaces it wholesale. Refreshes are generation-counted so workers that
//! lose the race reuse the fresh token instead of hammering the token
//! endpoint once per 401.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use harvester_common::{HarvestError, Result};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::api::ProgClient;
use crate::retry::RetryPolicy;

/// A token value tagged with the generation it was read at.
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    generation: u64,
}

/// Acquires fresh tokens from the auxiliary endpoint.
pub struct TokenProvider {
    client: Arc<ProgClient>,
    policy: RetryPolicy,
}

impl TokenProvider {
    pub fn new(client: Arc<ProgClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Acquire a fresh token, retrying with exponential backoff.
    ///
    /// Always performs a network round trip; callers decide when
    /// re-acquisition is warranted (on 401 from any downstream call).
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<String> {
        let mut attempt = 0u32;

        loop {
            match self.client.fetch_token().await {
                Ok(token) => {
                    debug!(attempt, "token acquired");
                    return Ok(token);
                },
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        error!(attempts = attempt, error = %e, "token endpoint unreachable, giving up");
                        return Err(HarvestError::CredentialsExhausted { attempts: attempt });
                    }
                    warn!(attempt, error = %e, "failed to fetch token, backing off");
                    self.policy.pause(attempt - 1, cancel).await?;
                },
            }
        }
    }
}

struct TokenState {
    value: Option<String>,
    generation: u64,
}

/// Atomically replaceable token cell shared by every worker.
///
/// Eventually consistent by design: a replacement race is benign because
/// each worker keeps using whichever value it holds and re-discovers
/// staleness independently on its next 401.
pub struct SharedToken {
    provider: TokenProvider,
    state: RwLock<TokenState>,
    refreshes: AtomicU64,
}

impl SharedToken {
    pub fn new(provider: TokenProvider) -> Self {
        Self {
            provider,
            state: RwLock::new(TokenState {
                value: None,
                generation: 0,
            }),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Current token, acquiring the initial one on first use.
    pub async fn current(&self, cancel: &CancellationToken) -> Result<Token> {
        {
            let state = self.state.read().await;
            if let Some(value) = &state.value {
                return Ok(Token {
                    value: value.clone(),
                    generation: state.generation,
                });
            }
        }

        let mut state = self.state.write().await;
        // Another task may have initialized while we waited for the lock.
        if state.value.is_none() {
            let fresh = self.provider.acquire(cancel).await?;
            state.value = Some(fresh);
            state.generation += 1;
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Token {
            // Checked non-empty above.
            value: state.value.clone().unwrap_or_default(),
            generation: state.generation,
        })
    }

    /// Replace a token that was rejected with a 401.
    ///
    /// If another worker already refreshed past `stale`, the cached value is
    /// returned without touching the token endpoint. The write lock is held
    /// across the acquisition so concurrent refreshes coalesce into one
    /// round trip.
    pub async fn refresh(&self, stale: &Token, cancel: &CancellationToken) -> Result<Token> {
        let mut state = self.state.write().await;

        if state.generation != stale.generation {
            if let Some(value) = &state.value {
                return Ok(Token {
                    value: value.clone(),
                    generation: state.generation,
                });
            }
        }

        let fresh = self.provider.acquire(cancel).await?;
        state.value = Some(fresh.clone());
        state.generation += 1;
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        Ok(Token {
            value: fresh,
            generation: state.generation,
        })
    }

    /// Number of token-endpoint acquisitions performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::HarvestConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn shared_token(server: &MockServer, max_retries: u32) -> SharedToken {
        let mut config = HarvestConfig::new("token-test");
        config.token_url = format!("{}/token", server.uri());
        config.api_base_url = server.uri();
        let client = Arc::new(ProgClient::new(&config).unwrap());
        let provider = TokenProvider::new(client, RetryPolicy::exponential(0, max_retries));
        SharedToken::new(provider)
    }

    #[tokio::test]
    async fn test_first_use_acquires_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let token = shared_token(&server, 3);
        let cancel = CancellationToken::new();

        let a = token.current(&cancel).await.unwrap();
        let b = token.current(&cancel).await.unwrap();
        assert_eq!(a.value, "tok-1");
        assert_eq!(b.value, "tok-1");
        assert_eq!(token.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_coalesces_racing_workers() {
        let server = MockServer::start().await;
        // Two acquisitions total: the initial token plus exactly one refresh,
        // even though two workers report the same stale generation.
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
            .expect(2)
            .mount(&server)
            .await;

        let token = shared_token(&server, 3);
        let cancel = CancellationToken::new();

        let stale = token.current(&cancel).await.unwrap();
        let first = token.refresh(&stale, &cancel).await.unwrap();
        let second = token.refresh(&stale, &cancel).await.unwrap();

        assert_eq!(first.generation, second.generation);
        assert_eq!(token.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_acquire_exhaustion_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let token = shared_token(&server, 1);
        let cancel = CancellationToken::new();

        let result = token.current(&cancel).await;
        assert!(matches!(
            result,
            Err(HarvestError::CredentialsExhausted { attempts: 1 })
        ));
    }
}

//! Search cursor
//!
//! Advances an integer page cursor over the search endpoint. Transport
//! failures are assumed transient and retried under the transient policy; a
//! 401 is returned to the caller immediately so it can refresh the token and
//! retry the *same* page number.

use std::sync::Arc;

use harvester_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::{ApiOutcome, ProgClient, SearchStub};
use crate::retry::RetryPolicy;
use crate::token::{SharedToken, Token};

/// Outcome of fetching one search page
#[derive(Debug)]
pub enum PageOutcome {
    /// The page has results; stubs are consumed once by fan-out.
    Results(Vec<SearchStub>),
    /// The token was rejected; carries the stale token for refresh.
    Unauthorized(Token),
    /// The page came back with zero results.
    Empty,
}

/// Paginated reader over the search endpoint
pub struct SearchCursor {
    client: Arc<ProgClient>,
    token: Arc<SharedToken>,
    retry: RetryPolicy,
}

impl SearchCursor {
    pub fn new(client: Arc<ProgClient>, token: Arc<SharedToken>, retry: RetryPolicy) -> Self {
        Self {
            client,
            token,
            retry,
        }
    }

    /// Fetch one page of search results.
    pub async fn fetch_page(&self, page: u64, cancel: &CancellationToken) -> Result<PageOutcome> {
        let mut attempt = 0u32;

        loop {
            let token = self.token.current(cancel).await?;

            match self.client.search_page(page, &token.value).await {
                Ok(ApiOutcome::Unauthorized) => return Ok(PageOutcome::Unauthorized(token)),
                Ok(ApiOutcome::Ok(response)) => {
                    if response.results.is_empty() {
                        return Ok(PageOutcome::Empty);
                    }
                    let stubs = response.results.into_iter().map(SearchStub::from).collect();
                    return Ok(PageOutcome::Results(stubs));
                },
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(HarvestError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(page, attempt, error = %e, "search request failed, retrying");
                    self.retry.pause(attempt - 1, cancel).await?;
                },
            }
        }
    }
}

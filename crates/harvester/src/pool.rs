//! Per-page fan-out
//!
//! Dispatches one fetch→normalize→upsert task per search stub with bounded
//! concurrency, then waits for every task to terminate before reporting.
//! That wait is the page barrier: the checkpoint may only advance once the
//! whole page is done. Completion order across tasks is irrelevant because
//! the sink is idempotent by key.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use harvester_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::api::types::SearchStub;
use crate::fetcher::{FetchOutcome, ProfileFetcher};
use crate::normalize::normalize;
use crate::retry::RetryPolicy;
use crate::sink::ProfileSink;
use crate::token::SharedToken;

/// Counters for one completed page
#[derive(Debug, Default, Clone, Copy)]
pub struct PageReport {
    /// Records normalized and durably upserted.
    pub upserted: u64,
    /// Records dropped after the malformed-payload retry budget ran out.
    pub skipped: u64,
}

enum StubOutcome {
    Upserted,
    Skipped,
}

/// Bounded worker pool processing one page at a time
pub struct PageProcessor {
    fetcher: ProfileFetcher,
    token: Arc<SharedToken>,
    sink: Arc<dyn ProfileSink>,
    upsert_retry: RetryPolicy,
    workers: usize,
    max_malformed_retries: u32,
}

impl PageProcessor {
    pub fn new(
        fetcher: ProfileFetcher,
        token: Arc<SharedToken>,
        sink: Arc<dyn ProfileSink>,
        upsert_retry: RetryPolicy,
        workers: usize,
        max_malformed_retries: u32,
    ) -> Self {
        Self {
            fetcher,
            token,
            sink,
            upsert_retry,
            workers,
            max_malformed_retries,
        }
    }

    /// Process every stub of one page and wait for all of them.
    ///
    /// Fatal errors (credential exhaustion, retry budget, cancellation)
    /// abort the page; in-flight siblings are dropped and the page is not
    /// checkpointed.
    pub async fn process_page(
        &self,
        page: u64,
        stubs: Vec<SearchStub>,
        cancel: &CancellationToken,
    ) -> Result<PageReport> {
        let mut report = PageReport::default();

        let mut outcomes = stream::iter(
            stubs
                .into_iter()
                .map(|stub| self.process_stub(page, stub, cancel)),
        )
        .buffer_unordered(self.workers);

        while let Some(outcome) = outcomes.next().await {
            match outcome? {
                StubOutcome::Upserted => report.upserted += 1,
                StubOutcome::Skipped => report.skipped += 1,
            }
        }

        Ok(report)
    }

    /// Fetch, normalize, and upsert one profile.
    ///
    /// Each task runs its own 401-refresh and malformed-refetch loop; a
    /// malformed payload exhausting its budget is reported and skipped so
    /// one bad record cannot stall the whole run.
    async fn process_stub(
        &self,
        page: u64,
        stub: SearchStub,
        cancel: &CancellationToken,
    ) -> Result<StubOutcome> {
        let profile_id = stub.profile_id;
        let mut malformed_attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            match self.fetcher.fetch(profile_id, cancel).await? {
                FetchOutcome::Unauthorized(stale) => {
                    warn!(page, profile_id, "detail returned 401, refreshing token");
                    self.token.refresh(&stale, cancel).await?;
                },
                FetchOutcome::Detail(envelope) => match normalize(envelope, &stub) {
                    Some(record) => {
                        self.upsert_with_retry(&record, cancel).await?;
                        return Ok(StubOutcome::Upserted);
                    },
                    None => {
                        malformed_attempts += 1;
                        if malformed_attempts > self.max_malformed_retries {
                            error!(
                                page,
                                profile_id,
                                attempts = malformed_attempts,
                                "detail payload still malformed, skipping record"
                            );
                            return Ok(StubOutcome::Skipped);
                        }
                        warn!(
                            page,
                            profile_id,
                            attempt = malformed_attempts,
                            "malformed detail payload, refreshing token and refetching"
                        );
                        let stale = self.token.current(cancel).await?;
                        self.token.refresh(&stale, cancel).await?;
                    },
                },
            }
        }
    }

    async fn upsert_with_retry(
        &self,
        record: &crate::api::types::NormalizedRecord,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut attempt = 0u32;

        loop {
            match self.sink.upsert(record).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.upsert_retry.max_attempts {
                        return Err(HarvestError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        profile_id = record.profile_id,
                        attempt,
                        error = %e,
                        "sink upsert failed, retrying"
                    );
                    self.upsert_retry.pause(attempt - 1, cancel).await?;
                },
            }
        }
    }
}

//! Pipeline coordinator
//!
//! Drives the page loop: acquire token, fetch a page of stubs, fan out one
//! fetch+normalize+upsert task per stub, wait for the barrier, advance the
//! checkpoint, repeat. Strict ordering across pages: page N's checkpoint is
//! never written before all of page N's workers complete, and page N+1 is
//! never fetched before that write returns.

use std::sync::Arc;

use harvester_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ProgClient;
use crate::checkpoint::FileCheckpoint;
use crate::config::HarvestConfig;
use crate::cursor::{PageOutcome, SearchCursor};
use crate::fetcher::ProfileFetcher;
use crate::pool::PageProcessor;
use crate::retry::RetryPolicy;
use crate::sink::ProfileSink;
use crate::token::{SharedToken, TokenProvider};

/// Summary of one pipeline run
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineStats {
    /// Pages whose barrier completed (empty pages included).
    pub pages_processed: u64,
    /// Records durably upserted.
    pub records_upserted: u64,
    /// Records skipped after the malformed-payload budget ran out.
    pub records_skipped: u64,
    /// Token-endpoint acquisitions, initial one included.
    pub token_refreshes: u64,
    /// Page the next run would fetch first.
    pub next_page: u64,
}

/// Coordinates the ingestion loop for one run
pub struct Pipeline {
    config: HarvestConfig,
    cursor: SearchCursor,
    processor: PageProcessor,
    checkpoint: FileCheckpoint,
    token: Arc<SharedToken>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Wire up the pipeline from configuration and a sink.
    pub fn new(
        config: HarvestConfig,
        sink: Arc<dyn ProfileSink>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(ProgClient::new(&config)?);
        let token_policy =
            RetryPolicy::exponential(config.token_backoff_factor, config.token_max_retries);
        let transient_policy = RetryPolicy::transient(
            config.transient_retry_delay_secs,
            config.transient_max_attempts,
        );

        let provider = TokenProvider::new(client.clone(), token_policy);
        let token = Arc::new(SharedToken::new(provider));

        let cursor = SearchCursor::new(client.clone(), token.clone(), transient_policy);
        let fetcher = ProfileFetcher::new(client, token.clone(), transient_policy);
        let processor = PageProcessor::new(
            fetcher,
            token.clone(),
            sink,
            transient_policy,
            config.workers,
            config.max_malformed_retries,
        );
        let checkpoint = FileCheckpoint::new(&config.checkpoint_dir, &config.run_id);

        Ok(Self {
            config,
            cursor,
            processor,
            checkpoint,
            token,
            cancel,
        })
    }

    /// Run the ingestion loop to exhaustion, ceiling, or cancellation.
    pub async fn run(&self) -> Result<PipelineStats> {
        let mut page = match self.checkpoint.load().await? {
            Some(page) => {
                info!(run_id = %self.config.run_id, page, "resuming from checkpoint");
                page
            },
            None => {
                info!(
                    run_id = %self.config.run_id,
                    page = self.config.start_page,
                    "no checkpoint found, starting fresh"
                );
                self.config.start_page
            },
        };

        let mut stats = PipelineStats {
            next_page: page,
            ..Default::default()
        };
        let mut consecutive_empty = 0u32;

        while page < self.config.max_page {
            if self.cancel.is_cancelled() {
                info!(page, "cancellation requested, stopping before next page");
                break;
            }

            let outcome = match self.cursor.fetch_page(page, &self.cancel).await {
                Ok(outcome) => outcome,
                Err(HarvestError::Cancelled) => {
                    info!(page, "cancelled while fetching page");
                    break;
                },
                Err(e) => return Err(e),
            };

            match outcome {
                PageOutcome::Unauthorized(stale) => {
                    // Same page is retried after the refresh; the cursor
                    // never advances on a 401.
                    warn!(page, "search returned 401, refreshing token");
                    self.token.refresh(&stale, &self.cancel).await?;
                    continue;
                },
                PageOutcome::Empty => {
                    consecutive_empty += 1;
                    warn!(page, consecutive_empty, "page returned no results");
                    if consecutive_empty >= self.config.max_consecutive_empty_pages {
                        info!(page, consecutive_empty, "source exhausted, stopping");
                        break;
                    }
                    // Nothing to fan out; the page is trivially complete.
                    self.checkpoint.save(page + 1).await?;
                    stats.pages_processed += 1;
                    page += 1;
                },
                PageOutcome::Results(stubs) => {
                    consecutive_empty = 0;
                    info!(page, stubs = stubs.len(), "processing page");

                    let report = match self.processor.process_page(page, stubs, &self.cancel).await
                    {
                        Ok(report) => report,
                        Err(HarvestError::Cancelled) => {
                            info!(page, "cancelled mid-page, page will be reprocessed");
                            break;
                        },
                        Err(e) => return Err(e),
                    };

                    // Barrier has completed; only now may the checkpoint move.
                    self.checkpoint.save(page + 1).await?;

                    stats.pages_processed += 1;
                    stats.records_upserted += report.upserted;
                    stats.records_skipped += report.skipped;
                    page += 1;
                },
            }
        }

        stats.next_page = page;
        stats.token_refreshes = self.token.refresh_count();

        info!(
            run_id = %self.config.run_id,
            pages = stats.pages_processed,
            upserted = stats.records_upserted,
            skipped = stats.records_skipped,
            token_refreshes = stats.token_refreshes,
            next_page = stats.next_page,
            "ingestion finished"
        );

        Ok(stats)
    }
}

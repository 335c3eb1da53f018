//! Harvester Library
//!
//! Resumable, concurrent profile ingestion: paginates a remote profile
//! search API, fetches the full record for every hit, normalizes it into a
//! single flat record, and upserts it into a durable sink keyed by profile
//! id. Progress is checkpointed per page so a restart resumes at the last
//! fully processed page.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester::{config::HarvestConfig, pipeline::Pipeline, sink::MemorySink};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarvestConfig::new("run-1");
//!     let sink = Arc::new(MemorySink::new());
//!     let pipeline = Pipeline::new(config, sink, CancellationToken::new())?;
//!     let stats = pipeline.run().await?;
//!     println!("upserted {} records", stats.records_upserted);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod sink;
pub mod token;

//! Harvester Common Library
//!
//! Shared error handling and logging setup for the harvester workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`HarvestError`] taxonomy and [`Result`] alias
//!   used across the pipeline crates
//! - **Logging**: centralized `tracing` initialization with console/file
//!   output and env-driven configuration

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{HarvestError, Result};

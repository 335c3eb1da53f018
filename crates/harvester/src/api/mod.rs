//! Profile API client and wire types

pub mod client;
pub mod types;

pub use client::{ApiOutcome, ProgClient};
pub use types::{
    DetailEnvelope, NormalizedRecord, ProfileDetail, SearchHit, SearchResponse, SearchStub,
};

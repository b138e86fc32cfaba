//! Normalization of Tardis exchange trade captures.
//!
//! Raw captured trade feeds of thirteen exchanges are extracted from their
//! exchange-specific envelopes, mapped onto one canonical column set per
//! exchange and written as compressed parquet tables.

pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod extract;
pub mod layout;
pub mod normalize;
pub mod pipeline;
#[cfg(feature = "replay")]
pub mod replay;
pub mod schema;
pub mod storage;
pub mod table;

pub use config::{MalformedPolicy, PipelineConfig};
pub use error::{Error, Result};
pub use pipeline::{AggregationPipeline, PipelineOutcome, PipelineReport, Strategy};

//! Pipeline configuration.
//!
//! Controls when a capture is processed per partition, the codec of written
//! tables and what happens to lines that do not decode.

use serde::{Deserialize, Serialize};

use crate::storage::Compression;

/// Configuration for an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Message count above which each partition gets its own cache and
    /// checkpoint file.
    /// Default: 1,000,000
    pub partition_threshold: usize,

    /// Codec for checkpoint and final tables.
    /// Default: LZ4
    pub compression: Compression,

    /// Handling of lines neither JSON decoder accepts.
    /// Default: skip and count
    pub malformed: MalformedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            partition_threshold: 1_000_000,
            compression: Compression::default(),
            malformed: MalformedPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_partition_threshold(mut self, threshold: usize) -> Self {
        self.partition_threshold = threshold;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_malformed(mut self, malformed: MalformedPolicy) -> Self {
        self.malformed = malformed;
        self
    }
}

/// What to do with a line that does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Skip the line and count it.
    #[default]
    Skip,
    /// Fail the run on the first such line.
    Abort,
}

//! Columnar output files.

mod columnar;

use parquet::basic::{Compression as ParquetCompression, ZstdLevel};
use serde::{Deserialize, Serialize};

pub use columnar::{read_batch, write_batch, ParquetSink, RowSink};

/// Block codec for written tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// LZ4 raw block codec.
    #[default]
    Lz4,
    Snappy,
    Zstd,
    Uncompressed,
}

impl Compression {
    pub fn codec(self) -> ParquetCompression {
        match self {
            Compression::Lz4 => ParquetCompression::LZ4_RAW,
            Compression::Snappy => ParquetCompression::SNAPPY,
            Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
            Compression::Uncompressed => ParquetCompression::UNCOMPRESSED,
        }
    }
}

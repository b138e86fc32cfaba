use std::path::PathBuf;

use thiserror::Error;

use crate::layout::LayoutError;
use crate::schema::ScalarType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown exchange `{exchange}` (supported: {supported})")]
    UnknownExchange { exchange: String, supported: String },

    #[error("malformed message at {}:{line}: {reason}", .path.display())]
    MalformedMessage {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{exchange}: capture contains no trade messages")]
    EmptyCapture { exchange: &'static str },

    #[error("{exchange}: row {row} exceeds preallocated capacity of {capacity} rows")]
    CapacityExceeded {
        exchange: &'static str,
        row: usize,
        capacity: usize,
    },

    #[error("{exchange}: out of order store at row {row} (cursor at {cursor})")]
    OutOfOrderStore {
        exchange: &'static str,
        row: usize,
        cursor: usize,
    },

    #[error("{exchange}: row {row} has {got} values, expected {expected}")]
    RowWidth {
        exchange: &'static str,
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("{exchange}: cache finalized with {filled} of {capacity} rows filled")]
    Underfilled {
        exchange: &'static str,
        filled: usize,
        capacity: usize,
    },

    #[error("{exchange}: cannot coerce {value} to {target} (row {row}, column {column})")]
    Coercion {
        exchange: &'static str,
        row: usize,
        column: &'static str,
        value: String,
        target: ScalarType,
    },

    #[error("{exchange}: invalid timestamp {value} (row {row}, column {column})")]
    Timestamp {
        exchange: &'static str,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("capture {}: {source}", .capture.display())]
    InCapture {
        capture: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "replay")]
    #[error("replay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Attaches the capture directory a pass was working on.
    pub fn in_capture(self, capture: impl Into<PathBuf>) -> Self {
        match self {
            Error::InCapture { .. } => self,
            other => Error::InCapture {
                capture: capture.into(),
                source: Box::new(other),
            },
        }
    }

    /// Process exit status for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InCapture { source, .. } => source.exit_code(),
            Error::EmptyCapture { .. } => 0,
            Error::UnknownExchange { .. } | Error::Layout(_) => 2,
            Error::MalformedMessage { .. } => 3,
            Error::CapacityExceeded { .. }
            | Error::OutOfOrderStore { .. }
            | Error::RowWidth { .. }
            | Error::Underfilled { .. } => 4,
            Error::Coercion { .. } | Error::Timestamp { .. } => 5,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

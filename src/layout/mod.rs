//! On-disk layout of the replay cache.
//!
//! ```text
//! <cache_root>/
//!   <exchange><YYYYMMDD>_<YYYYMMDDHHMMSS>/   capture
//!     <HH>/<MM>.json.gz                       one replayed minute
//!     <HH>/trd_tmp_<YYYYMMDD>.parquet         partition checkpoint
//!     trd_<YYYYMMDD>.parquet                  final table
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use time::{Date, Month, OffsetDateTime};

pub const RAW_EXTENSION: &str = ".json.gz";
pub const OUTPUT_EXTENSION: &str = "parquet";
const CHECKPOINT_PREFIX: &str = "trd_tmp_";
const FINAL_PREFIX: &str = "trd_";
pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    EmptyComponent { field: &'static str },
    InvalidComponent { field: &'static str, value: String },
    InvalidDate { value: String },
    InvalidMinute { minute: u32 },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyComponent { field } => {
                write!(f, "empty path component: {field}")
            }
            LayoutError::InvalidComponent { field, value } => {
                write!(f, "invalid path component for {field}: {value}")
            }
            LayoutError::InvalidDate { value } => {
                write!(f, "invalid date format (expected YYYY-MM-DD): {value}")
            }
            LayoutError::InvalidMinute { minute } => {
                write!(f, "minute of day out of range: {minute}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

type Result<T> = std::result::Result<T, LayoutError>;

/// Root directory holding one sub-directory per capture.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capture_dir(
        &self,
        exchange: &str,
        date: Date,
        created: OffsetDateTime,
    ) -> Result<CaptureLayout> {
        validate_component("exchange", exchange)?;
        let name = format!(
            "{exchange}{}_{}",
            compact_date(date),
            compact_timestamp(created)
        );
        Ok(CaptureLayout::new(self.root.join(name)))
    }
}

/// One capture directory.
#[derive(Debug, Clone)]
pub struct CaptureLayout {
    root: PathBuf,
}

impl CaptureLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw slice for `minute` of the day, grouped by hour.
    pub fn slice_path(&self, minute: u32) -> Result<PathBuf> {
        if minute >= MINUTES_PER_DAY {
            return Err(LayoutError::InvalidMinute { minute });
        }
        Ok(self
            .root
            .join(format!("{:02}", minute / 60))
            .join(format!("{:02}{RAW_EXTENSION}", minute % 60)))
    }

    pub fn final_output(&self, date: Date) -> PathBuf {
        self.root.join(output_file_name(FINAL_PREFIX, date))
    }

    /// Every raw slice below the capture root, ordered by parent directory
    /// and then by file name. Files of one directory are contiguous and
    /// directories come in the order `partitions` visits them.
    pub fn raw_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                } else if is_raw_file(&path) {
                    files.push(path);
                }
            }
        }
        files.sort_by(|a, b| (a.parent(), a.file_name()).cmp(&(b.parent(), b.file_name())));
        Ok(files)
    }
}

/// A directory of raw slices and the index range of its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub dir: PathBuf,
    pub files: Range<usize>,
}

/// Groups `files`, as returned by [`CaptureLayout::raw_files`], into runs
/// sharing a parent directory.
pub fn partitions(files: &[PathBuf]) -> Vec<Partition> {
    let mut parts: Vec<Partition> = Vec::new();
    for (index, file) in files.iter().enumerate() {
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        match parts.last_mut() {
            Some(last) if last.dir == dir => last.files.end = index + 1,
            _ => parts.push(Partition {
                dir: dir.to_path_buf(),
                files: index..index + 1,
            }),
        }
    }
    parts
}

pub fn checkpoint_path(partition: &Path, date: Date) -> PathBuf {
    partition.join(output_file_name(CHECKPOINT_PREFIX, date))
}

pub fn is_raw_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(RAW_EXTENSION))
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<Date> {
    validate_date(value)?;
    let invalid = || LayoutError::InvalidDate {
        value: value.to_string(),
    };
    let year: i32 = value[0..4].parse().map_err(|_| invalid())?;
    let month: u8 = value[5..7].parse().map_err(|_| invalid())?;
    let day: u8 = value[8..10].parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

pub fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

pub fn compact_date(date: Date) -> String {
    format!(
        "{:04}{:02}{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

fn compact_timestamp(dt: OffsetDateTime) -> String {
    format!(
        "{}{:02}{:02}{:02}",
        compact_date(dt.date()),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

fn output_file_name(prefix: &str, date: Date) -> String {
    format!("{prefix}{}.{OUTPUT_EXTENSION}", compact_date(date))
}

fn validate_component(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LayoutError::EmptyComponent { field });
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(LayoutError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_date(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
    if !well_formed {
        return Err(LayoutError::InvalidDate {
            value: value.to_string(),
        });
    }
    Ok(())
}

//! Capture aggregation.
//!
//! A run counts the trade messages of a capture first, then picks one of two
//! strategies:
//!
//! - **Single pass**: the whole capture fits under the partition threshold and
//!   is read into one cache, normalized and written as the final table.
//! - **Partitioned**: every directory holding raw slices is processed on its
//!   own and checkpointed next to its slices; the checkpoints are then read
//!   back in directory order, concatenated and renumbered into the final
//!   table.
//!
//! Both strategies produce the same rows in the same order.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};
use time::Date;

use crate::cache::{ColumnCache, ColumnHeadings, UnmappedFields};
use crate::capture::{count_messages, for_each_line, reject_malformed, MessageCount};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::extract::RecordExtractor;
use crate::layout::{self, CaptureLayout};
use crate::normalize::normalize_timestamps;
use crate::schema::{schema_for, ExchangeSchema};
use crate::storage::{read_batch, write_batch};
use crate::table::{renumber, CanonicalTable};

/// Counters of the fill passes of a run.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files: usize,
    pub lines: usize,
    pub records: usize,
    pub malformed: usize,
    pub unmapped: UnmappedFields,
    pub duration: Duration,
}

impl ScanStats {
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SinglePass,
    /// Number of partitions that produced a checkpoint.
    Partitioned { partitions: usize },
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub rows: usize,
    pub strategy: Strategy,
    pub stats: ScanStats,
    pub checkpoints: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// No trade messages; nothing was written.
    Empty { capture: PathBuf },
    Written(PipelineReport),
}

impl PipelineOutcome {
    pub fn rows(&self) -> usize {
        match self {
            PipelineOutcome::Empty { .. } => 0,
            PipelineOutcome::Written(report) => report.rows,
        }
    }
}

pub struct AggregationPipeline {
    schema: &'static ExchangeSchema,
    extractor: RecordExtractor,
    config: PipelineConfig,
}

impl AggregationPipeline {
    pub fn new(exchange: &str, config: PipelineConfig) -> Result<Self> {
        let schema = schema_for(exchange)?;
        Ok(Self {
            schema,
            extractor: RecordExtractor::new(schema),
            config,
        })
    }

    pub fn schema(&self) -> &'static ExchangeSchema {
        self.schema
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Aggregates the capture at `capture_root` into `trd_<date>.parquet`.
    pub fn run(&self, capture_root: &Path, date: Date) -> Result<PipelineOutcome> {
        self.aggregate(capture_root, date)
            .map_err(|err| err.in_capture(capture_root))
    }

    fn aggregate(&self, capture_root: &Path, date: Date) -> Result<PipelineOutcome> {
        let exchange = self.schema.exchange;
        let start = Instant::now();
        let capture = CaptureLayout::new(capture_root);
        let files = capture.raw_files()?;
        info!(
            "{exchange}: {} raw files under {}",
            files.len(),
            capture_root.display()
        );

        let count = count_messages(&files, &self.extractor, self.config.malformed)?;
        info!(
            "{exchange}: {} trade messages in {} lines",
            count.messages, count.lines
        );
        if count.messages == 0 {
            info!("{exchange}: capture holds no trade messages, nothing written");
            return Ok(PipelineOutcome::Empty {
                capture: capture_root.to_path_buf(),
            });
        }

        let output = capture.final_output(date);
        let mut stats = ScanStats::default();
        let (batch, strategy, checkpoints) = if count.messages <= self.config.partition_threshold
        {
            let table = self.build_table(&files, count.messages, &mut stats)?;
            (table.into_record_batch()?, Strategy::SinglePass, Vec::new())
        } else {
            info!(
                "{exchange}: {} messages exceed threshold of {}, processing per partition",
                count.messages, self.config.partition_threshold
            );
            let checkpoints = self.write_checkpoints(&files, &count, date, &mut stats)?;
            let batch = combine_checkpoints(exchange, &checkpoints)?;
            let strategy = Strategy::Partitioned {
                partitions: checkpoints.len(),
            };
            (batch, strategy, checkpoints)
        };

        let rows = batch.num_rows();
        write_batch(batch, &output, self.config.compression)?;
        stats.duration = start.elapsed();

        if stats.malformed > 0 {
            warn!("{exchange}: skipped {} malformed lines", stats.malformed);
        }
        for (field, seen) in stats.unmapped.iter() {
            warn!("{exchange}: dropped unmapped field `{field}` {seen} times");
        }
        info!(
            "{exchange}: wrote {rows} rows to {} ({:.0} msg/sec)",
            output.display(),
            stats.throughput()
        );

        Ok(PipelineOutcome::Written(PipelineReport {
            output,
            rows,
            strategy,
            stats,
            checkpoints,
        }))
    }

    /// Fills one cache of exactly `capacity` rows from `files` and returns the
    /// finalized, normalized table.
    fn build_table(
        &self,
        files: &[PathBuf],
        capacity: usize,
        stats: &mut ScanStats,
    ) -> Result<CanonicalTable> {
        let schema = self.schema;
        let policy = self.config.malformed;
        let mut cache = ColumnCache::new(schema, capacity)?;
        let mut headings = (!schema.envelope.carries_field_names())
            .then(|| ColumnHeadings::declared(schema));
        let mut unmapped = UnmappedFields::default();

        for path in files {
            let lines = for_each_line(path, |line_no, line| {
                let records = match self.extractor.extract(line) {
                    Ok(records) => records,
                    Err(malformed) => {
                        stats.malformed += 1;
                        return reject_malformed(policy, path, line_no, malformed);
                    }
                };
                for record in records {
                    let headings =
                        headings.get_or_insert_with(|| ColumnHeadings::infer(schema, &record));
                    cache.push(headings.arrange(record, &mut unmapped))?;
                    stats.records += 1;
                }
                Ok(())
            })?;
            stats.lines += lines;
            stats.files += 1;
            debug!(
                "{}: filled {} ({} of {capacity} rows)",
                schema.exchange,
                path.display(),
                cache.cursor()
            );
        }

        let headings = headings.unwrap_or_else(|| ColumnHeadings::declared(schema));
        let mut table = cache.finalize(&headings)?;
        normalize_timestamps(&mut table, schema)?;
        stats.unmapped.merge(&unmapped);
        Ok(table)
    }

    /// Writes one checkpoint per partition holding trades. Partition
    /// capacities come from the per-file tally of the counting pass.
    fn write_checkpoints(
        &self,
        files: &[PathBuf],
        count: &MessageCount,
        date: Date,
        stats: &mut ScanStats,
    ) -> Result<Vec<PathBuf>> {
        let exchange = self.schema.exchange;
        let mut checkpoints = Vec::new();
        for part in layout::partitions(files) {
            let messages = count.messages_in(part.files.clone());
            if messages == 0 {
                debug!("{exchange}: no trade messages in {}, skipped", part.dir.display());
                continue;
            }
            let table = self.build_table(&files[part.files], messages, stats)?;
            let checkpoint = layout::checkpoint_path(&part.dir, date);
            debug!(
                "{exchange}: checkpoint {} ({} rows)",
                checkpoint.display(),
                table.num_rows()
            );
            write_batch(
                table.into_record_batch()?,
                &checkpoint,
                self.config.compression,
            )?;
            checkpoints.push(checkpoint);
        }
        Ok(checkpoints)
    }
}

fn combine_checkpoints(exchange: &'static str, checkpoints: &[PathBuf]) -> Result<RecordBatch> {
    let batches = checkpoints
        .iter()
        .map(|path| read_batch(path))
        .collect::<Result<Vec<_>>>()?;
    let Some(first) = batches.first() else {
        return Err(Error::EmptyCapture { exchange });
    };
    let combined = concat_batches(&first.schema(), &batches)?;
    renumber(&combined)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn unknown_exchange_fails_before_any_io() {
        let err = AggregationPipeline::new("mtgox", PipelineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownExchange { .. }));
    }

    #[test]
    fn capture_without_slices_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = AggregationPipeline::new("bitmex", PipelineConfig::default()).unwrap();
        let outcome = pipeline.run(dir.path(), date!(2020 - 09 - 01)).unwrap();
        assert!(matches!(outcome, PipelineOutcome::Empty { .. }));
        assert_eq!(outcome.rows(), 0);
    }

    #[test]
    fn missing_capture_reports_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let pipeline = AggregationPipeline::new("bitmex", PipelineConfig::default()).unwrap();
        let err = pipeline.run(&missing, date!(2020 - 09 - 01)).unwrap_err();
        assert!(matches!(err, Error::InCapture { .. }));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.exit_code(), 1);
    }
}

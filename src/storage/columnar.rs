use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;

use super::Compression;
use crate::error::Result;

pub trait RowSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct ParquetSink<W: Write + Seek + Send> {
    writer: Option<ArrowWriter<W>>,
}

impl ParquetSink<File> {
    pub fn try_new(
        path: impl AsRef<Path>,
        schema: SchemaRef,
        compression: Compression,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(file, schema, Some(writer_properties(compression)))
    }
}

impl<W: Write + Seek + Send> ParquetSink<W> {
    pub fn from_writer(
        writer: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        let writer = ArrowWriter::try_new(writer, Arc::clone(&schema), props)?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl<W: Write + Seek + Send> RowSink for ParquetSink<W> {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ParquetError::General("parquet sink is closed".to_string()).into());
        };
        writer.write(&batch)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let _ = writer.close()?;
        }
        Ok(())
    }
}

/// Writes `batch` to `path` through a temporary sibling file, so readers
/// never observe a partial table. The temporary file is removed on failure.
pub fn write_batch(batch: RecordBatch, path: &Path, compression: Compression) -> Result<()> {
    let tmp = tmp_path_for(path);
    let written = write_and_rename(batch, &tmp, path, compression);
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn write_and_rename(
    batch: RecordBatch,
    tmp: &Path,
    path: &Path,
    compression: Compression,
) -> Result<()> {
    let mut sink = ParquetSink::try_new(tmp, batch.schema(), compression)?;
    sink.write_batch(batch)?;
    sink.finish()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Reads a whole table back as one batch.
pub fn read_batch(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn writer_properties(compression: Compression) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(compression.codec())
        .build()
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

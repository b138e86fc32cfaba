//! Canonical trade tables.
//!
//! A [`CanonicalTable`] is the typed, column-oriented result of one cache pass:
//! the exchange's canonical columns in schema order plus a zero-based
//! `msg_num` index. It converts into an Arrow [`RecordBatch`] for the columnar
//! writer.
//!
//! | declared type | stored as |
//! |---|---|
//! | `str` | `Utf8` |
//! | `int` | `Float64` |
//! | `float` | `Float64` |
//! | `bool` | `Boolean` |
//! | timestamp columns | `Timestamp(Nanosecond, "UTC")` |

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, StringArray, TimestampNanosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Zero-based row number column.
pub const INDEX_COLUMN: &str = "msg_num";
pub const TIMESTAMP_TZ: &str = "UTC";

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<Option<String>>),
    Float64(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    /// Nanoseconds since the Unix epoch.
    Timestamp(Vec<Option<i64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(values) => values.len(),
            ColumnData::Float64(values) => values.len(),
            ColumnData::Boolean(values) => values.len(),
            ColumnData::Timestamp(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, ColumnData::Timestamp(_))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Timestamp(_) => timestamp_type(),
        }
    }

    fn into_array(self) -> ArrayRef {
        match self {
            ColumnData::Utf8(values) => Arc::new(StringArray::from(values)),
            ColumnData::Float64(values) => Arc::new(Float64Array::from(values)),
            ColumnData::Boolean(values) => Arc::new(BooleanArray::from(values)),
            ColumnData::Timestamp(values) => {
                Arc::new(TimestampNanosecondArray::from(values).with_timezone(TIMESTAMP_TZ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub data: ColumnData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    exchange: &'static str,
    rows: usize,
    columns: Vec<Column>,
}

impl CanonicalTable {
    pub fn new(exchange: &'static str, rows: usize, columns: Vec<Column>) -> Self {
        debug_assert!(columns.iter().all(|c| c.data.len() == rows));
        Self {
            exchange,
            rows,
            columns,
        }
    }

    pub fn exchange(&self) -> &'static str {
        self.exchange
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnData> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.data)
    }

    pub fn schema(&self) -> SchemaRef {
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        fields.push(index_field());
        for column in &self.columns {
            fields.push(Field::new(column.name, column.data.data_type(), true));
        }
        Arc::new(Schema::new(fields))
    }

    pub fn into_record_batch(self) -> Result<RecordBatch> {
        let schema = self.schema();
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 1);
        arrays.push(index_array(self.rows));
        arrays.extend(self.columns.into_iter().map(|c| c.data.into_array()));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

/// Replaces the index column of `batch` with a fresh `0..n` sequence.
pub fn renumber(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let position = schema.index_of(INDEX_COLUMN)?;
    let mut arrays = batch.columns().to_vec();
    arrays[position] = index_array(batch.num_rows());
    Ok(RecordBatch::try_new(schema, arrays)?)
}

pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Nanosecond, Some(TIMESTAMP_TZ.into()))
}

fn index_field() -> Field {
    Field::new(INDEX_COLUMN, DataType::UInt64, false)
}

fn index_array(rows: usize) -> ArrayRef {
    Arc::new(UInt64Array::from_iter_values(0..rows as u64))
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::UInt64Type;

    use super::*;

    fn sample() -> CanonicalTable {
        CanonicalTable::new(
            "kraken",
            2,
            vec![
                Column {
                    name: "px",
                    data: ColumnData::Float64(vec![Some(1.5), None]),
                },
                Column {
                    name: "trd_time",
                    data: ColumnData::Timestamp(vec![Some(1_000), Some(2_000)]),
                },
            ],
        )
    }

    #[test]
    fn record_batch_leads_with_index() {
        let batch = sample().into_record_batch().unwrap();
        let schema = batch.schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec![INDEX_COLUMN, "px", "trd_time"]);
        assert_eq!(schema.field(2).data_type(), &timestamp_type());

        let index = batch.column(0).as_primitive::<UInt64Type>();
        assert_eq!(index.values().to_vec(), vec![0, 1]);
        assert_eq!(batch.column(1).null_count(), 1);
    }

    #[test]
    fn renumber_rewrites_index_only() {
        let batch = sample().into_record_batch().unwrap();
        let sliced = batch.slice(1, 1);
        let renumbered = renumber(&sliced).unwrap();
        let index = renumbered.column(0).as_primitive::<UInt64Type>();
        assert_eq!(index.value(0), 0);
        assert_eq!(renumbered.column(2).as_ref(), sliced.column(2).as_ref());
    }

    #[test]
    fn column_lookup_by_name() {
        let mut table = sample();
        assert!(table.column("trd_time").unwrap().is_timestamp());
        assert!(table.column("evt_time").is_none());
        if let Some(ColumnData::Float64(values)) = table.column_mut("px") {
            values[1] = Some(2.0);
        }
        assert_eq!(
            table.column("px"),
            Some(&ColumnData::Float64(vec![Some(1.5), Some(2.0)]))
        );
    }
}

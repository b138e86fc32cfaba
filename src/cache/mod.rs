//! Preallocated row store for extracted records.
//!
//! Captures reach tens of millions of trades, so rows are never appended to a
//! growing table. The counting pass sizes a fixed `capacity × width` row-major
//! store up front; the fill pass writes rows at a running cursor; `finalize`
//! turns the filled store into a typed [`CanonicalTable`] in one sweep per
//! column.

use std::collections::BTreeMap;

use log::warn;

use crate::error::{Error, Result};
use crate::extract::{RawRecord, Scalar};
use crate::schema::{ExchangeSchema, FieldSpec, ScalarType};
use crate::table::{CanonicalTable, Column, ColumnData};

/// Raw field layout of the cache rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeadings {
    raw: Vec<&'static str>,
}

impl ColumnHeadings {
    /// Schema field order. Used when messages carry no field names.
    pub fn declared(schema: &'static ExchangeSchema) -> Self {
        Self {
            raw: schema.raw_names().collect(),
        }
    }

    /// Field order of the first record of a capture, completed with any
    /// schema fields it did not carry.
    pub fn infer(schema: &'static ExchangeSchema, first: &RawRecord) -> Self {
        let mut raw = Vec::with_capacity(schema.width());
        let known = first.keys().filter_map(|key| schema.field(key));
        for spec in known.chain(schema.fields.iter()) {
            if !raw.contains(&spec.raw) {
                raw.push(spec.raw);
            }
        }
        Self { raw }
    }

    pub fn raw(&self) -> &[&'static str] {
        &self.raw
    }

    pub fn width(&self) -> usize {
        self.raw.len()
    }

    pub fn slot(&self, raw: &str) -> Option<usize> {
        self.raw.iter().position(|name| *name == raw)
    }

    /// Orders a record's values by heading. Fields outside the schema are
    /// dropped and tallied.
    pub fn arrange(&self, record: RawRecord, unmapped: &mut UnmappedFields) -> Vec<Scalar> {
        let mut row = vec![Scalar::Null; self.raw.len()];
        for (key, value) in record {
            match self.slot(&key) {
                Some(slot) => row[slot] = value,
                None => unmapped.note(&key),
            }
        }
        row
    }
}

/// Fields seen in messages that no canonical column covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmappedFields {
    counts: BTreeMap<String, usize>,
}

impl UnmappedFields {
    pub fn note(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                warn!("dropping field `{key}`: not part of the canonical schema");
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    pub fn merge(&mut self, other: &UnmappedFields) {
        for (key, count) in &other.counts {
            *self.counts.entry(key.clone()).or_default() += count;
        }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }
}

#[derive(Debug)]
pub struct ColumnCache {
    schema: &'static ExchangeSchema,
    cells: Vec<Scalar>,
    width: usize,
    capacity: usize,
    cursor: usize,
}

impl ColumnCache {
    /// Allocates room for exactly `capacity` rows. A zero-row cache is refused.
    pub fn new(schema: &'static ExchangeSchema, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::EmptyCapture {
                exchange: schema.exchange,
            });
        }
        let width = schema.width();
        let mut cells = Vec::new();
        cells.resize(capacity * width, Scalar::Null);
        Ok(Self {
            schema,
            cells,
            width,
            capacity,
            cursor: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_full(&self) -> bool {
        self.cursor == self.capacity
    }

    /// Writes `values` at `row`, which must be the current cursor.
    pub fn store(&mut self, row: usize, values: Vec<Scalar>) -> Result<()> {
        let exchange = self.schema.exchange;
        if row >= self.capacity {
            return Err(Error::CapacityExceeded {
                exchange,
                row,
                capacity: self.capacity,
            });
        }
        if row != self.cursor {
            return Err(Error::OutOfOrderStore {
                exchange,
                row,
                cursor: self.cursor,
            });
        }
        if values.len() != self.width {
            return Err(Error::RowWidth {
                exchange,
                row,
                got: values.len(),
                expected: self.width,
            });
        }
        let start = row * self.width;
        for (cell, value) in self.cells[start..start + self.width].iter_mut().zip(values) {
            *cell = value;
        }
        self.cursor += 1;
        Ok(())
    }

    /// Stores at the cursor and returns the row written.
    pub fn push(&mut self, values: Vec<Scalar>) -> Result<usize> {
        let row = self.cursor;
        self.store(row, values)?;
        Ok(row)
    }

    /// Coerces every column to its declared type. Columns come out in schema
    /// order whatever the heading order of the rows.
    pub fn finalize(mut self, headings: &ColumnHeadings) -> Result<CanonicalTable> {
        let exchange = self.schema.exchange;
        if self.cursor < self.capacity {
            return Err(Error::Underfilled {
                exchange,
                filled: self.cursor,
                capacity: self.capacity,
            });
        }
        if headings.width() != self.width {
            return Err(Error::RowWidth {
                exchange,
                row: 0,
                got: headings.width(),
                expected: self.width,
            });
        }

        let rows = self.capacity;
        let mut columns = Vec::with_capacity(self.width);
        for spec in self.schema.fields {
            let slot = headings.slot(spec.raw);
            let cells = &mut self.cells;
            let width = self.width;
            let values = (0..rows).map(|row| match slot {
                Some(slot) => std::mem::take(&mut cells[row * width + slot]),
                None => Scalar::Null,
            });
            let data = coerce_column(exchange, spec, values)?;
            columns.push(Column {
                name: spec.canonical,
                data,
            });
        }
        Ok(CanonicalTable::new(exchange, rows, columns))
    }
}

fn coerce_column(
    exchange: &'static str,
    spec: &FieldSpec,
    values: impl ExactSizeIterator<Item = Scalar>,
) -> Result<ColumnData> {
    let target = spec.ty.storage_type();
    let invalid = |row: usize, value: &Scalar| Error::Coercion {
        exchange,
        row,
        column: spec.canonical,
        value: value.to_string(),
        target,
    };

    let data = match target {
        ScalarType::Str => ColumnData::Utf8(values.map(into_text).collect()),
        ScalarType::Int | ScalarType::Float => {
            let mut out = Vec::with_capacity(values.len());
            for (row, value) in values.enumerate() {
                out.push(try_float(&value).ok_or_else(|| invalid(row, &value))?);
            }
            ColumnData::Float64(out)
        }
        ScalarType::Bool => {
            let mut out = Vec::with_capacity(values.len());
            for (row, value) in values.enumerate() {
                out.push(try_bool(&value).ok_or_else(|| invalid(row, &value))?);
            }
            ColumnData::Boolean(out)
        }
    };
    Ok(data)
}

fn into_text(value: Scalar) -> Option<String> {
    match value {
        Scalar::Null => None,
        Scalar::Bool(b) => Some(b.to_string()),
        Scalar::Number(n) => Some(n.to_string()),
        Scalar::Str(s) => Some(s),
    }
}

// Outer `None` means the value cannot be represented.
fn try_float(value: &Scalar) -> Option<Option<f64>> {
    match value {
        Scalar::Null => Some(None),
        Scalar::Bool(b) => Some(Some(if *b { 1.0 } else { 0.0 })),
        Scalar::Number(n) => n.as_f64().map(Some),
        Scalar::Str(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse::<f64>().ok().map(Some)
            }
        }
    }
}

fn try_bool(value: &Scalar) -> Option<Option<bool>> {
    match value {
        Scalar::Null => Some(None),
        Scalar::Bool(b) => Some(Some(*b)),
        Scalar::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(Some(false)),
            Some(v) if v == 1.0 => Some(Some(true)),
            _ => None,
        },
        Scalar::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Some(true)),
            "false" | "0" => Some(Some(false)),
            "" => Some(None),
            _ => None,
        },
    }
}

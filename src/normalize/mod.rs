//! Timestamp normalization.
//!
//! Exchanges encode trade times three ways: ISO-8601 strings, integer epoch
//! milliseconds and decimal epoch seconds. Each becomes a nanosecond UTC
//! timestamp column. Columns that are absent or already converted are left
//! alone, so running the normalizer twice changes nothing.

use std::fmt;

use log::debug;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::{Error, Result};
use crate::schema::{ExchangeSchema, TimestampUnit};
use crate::table::{CanonicalTable, ColumnData};

const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Converts the timestamp columns of `table` in place and returns how many
/// were converted.
pub fn normalize_timestamps(table: &mut CanonicalTable, schema: &ExchangeSchema) -> Result<usize> {
    let exchange = schema.exchange;
    let unit = schema.timestamps;
    let mut converted = 0;

    for &column in unit.columns() {
        let Some(data) = table.column_mut(column) else {
            continue;
        };
        if data.is_timestamp() {
            continue;
        }
        let nanos = to_nanos(data, unit).map_err(|(row, value)| Error::Timestamp {
            exchange,
            row,
            column,
            value,
        })?;
        *data = ColumnData::Timestamp(nanos);
        converted += 1;
    }

    if converted > 0 {
        debug!("{exchange}: normalized {converted} timestamp column(s) ({unit:?})");
    }
    Ok(converted)
}

type Converted = std::result::Result<Vec<Option<i64>>, (usize, String)>;

fn to_nanos(data: &ColumnData, unit: TimestampUnit) -> Converted {
    match data {
        ColumnData::Utf8(values) => convert(values, |text| parse_text(text, unit)),
        ColumnData::Float64(values) => convert(values, |value| from_number(*value, unit)),
        ColumnData::Boolean(values) => convert(values, |_| None),
        ColumnData::Timestamp(values) => Ok(values.clone()),
    }
}

fn convert<T: fmt::Debug>(values: &[Option<T>], parse: impl Fn(&T) -> Option<i64>) -> Converted {
    values
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(None),
            Some(value) => parse(value)
                .map(Some)
                .ok_or_else(|| (row, format!("{value:?}"))),
        })
        .collect()
}

fn parse_text(text: &str, unit: TimestampUnit) -> Option<i64> {
    let text = text.trim();
    match unit {
        TimestampUnit::Iso8601 => parse_iso(text),
        TimestampUnit::EpochMillis => text.parse::<f64>().ok().and_then(millis_to_nanos),
        TimestampUnit::EpochSeconds => parse_decimal_seconds(text)
            .or_else(|| text.parse::<f64>().ok().and_then(seconds_to_nanos)),
    }
}

fn from_number(value: f64, unit: TimestampUnit) -> Option<i64> {
    match unit {
        TimestampUnit::Iso8601 => None,
        TimestampUnit::EpochMillis => millis_to_nanos(value),
        TimestampUnit::EpochSeconds => seconds_to_nanos(value),
    }
}

/// RFC 3339 first, then the wider ISO-8601 grammar. A missing offset means UTC.
fn parse_iso(text: &str) -> Option<i64> {
    let parsed = OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, &Iso8601::DEFAULT))
        .or_else(|_| {
            PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
        })
        .ok()?;
    i64::try_from(parsed.unix_timestamp_nanos()).ok()
}

// Fractional milliseconds are truncated.
fn millis_to_nanos(value: f64) -> Option<i64> {
    if !value.is_finite() || value.abs() >= (i64::MAX / NANOS_PER_MILLI) as f64 {
        return None;
    }
    (value.trunc() as i64).checked_mul(NANOS_PER_MILLI)
}

fn seconds_to_nanos(value: f64) -> Option<i64> {
    let nanos = value * NANOS_PER_SECOND as f64;
    if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(nanos.round() as i64)
}

/// Exact decimal parse of `<seconds>[.<fraction>]`; digits past nanosecond
/// precision are dropped.
fn parse_decimal_seconds(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(fraction) {
        return None;
    }

    let seconds: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction = &fraction[..fraction.len().min(9)];
    let mut nanos: i64 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    nanos *= 10_i64.pow((9 - fraction.len()) as u32);

    let total = seconds.checked_mul(NANOS_PER_SECOND)?.checked_add(nanos)?;
    Some(if negative { -total } else { total })
}

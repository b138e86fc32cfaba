//! Per-exchange canonical schemas.
//!
//! Every supported exchange has one [`ExchangeSchema`]: the ordered raw field
//! table with canonical names and target types, the message type used to
//! request the feed, the envelope shape its messages arrive in, and how its
//! trade timestamps are encoded. The table itself lives in [`registry`] and is
//! a compile-time constant.

mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use registry::SCHEMAS;

/// Canonical column holding the trade time.
pub const TRADE_TIME: &str = "trd_time";
/// Canonical column holding the exchange event time.
pub const EVENT_TIME: &str = "evt_time";

/// Target type a raw field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Str,
    Int,
    Float,
    Bool,
}

impl ScalarType {
    /// Type actually stored in the table. Integers are widened to floats
    /// because captures may contain nulls or partial rows.
    pub fn storage_type(self) -> ScalarType {
        match self {
            ScalarType::Int => ScalarType::Float,
            other => other,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Str => "str",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub raw: &'static str,
    pub canonical: &'static str,
    pub ty: ScalarType,
}

pub const fn field(raw: &'static str, canonical: &'static str, ty: ScalarType) -> FieldSpec {
    FieldSpec { raw, canonical, ty }
}

/// Copies a top-level envelope field into every extracted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInjection {
    pub source: &'static str,
    pub target: &'static str,
}

/// Structural shape of an exchange's message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Records under a top-level `data` key.
    Generic { inject: Option<SymbolInjection> },
    /// Records under `tick.data`, channel name decorated with a fixed
    /// prefix and suffix.
    NestedTick {
        inject: SymbolInjection,
        strip_prefix: &'static str,
        strip_suffix: &'static str,
    },
    /// Records under `params.data`; listed fields are dropped.
    NestedParams { prune: &'static [&'static str] },
    /// The envelope is the record when its discriminator matches.
    FlatTyped {
        discriminator: &'static str,
        trade_value: &'static str,
    },
    /// `[channel_id, [[..], ..], tag, symbol]` with fields by position.
    PositionalArray {
        channel_tag: &'static str,
        tag_index: usize,
        rows_index: usize,
        symbol_index: usize,
        positions: &'static [&'static str],
        symbol_field: &'static str,
    },
}

impl Envelope {
    /// Whether messages carry field names. Positional envelopes do not, so
    /// their column headings come from the schema instead of the first record.
    pub fn carries_field_names(&self) -> bool {
        !matches!(self, Envelope::PositionalArray { .. })
    }
}

/// How an exchange encodes its trade timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    Iso8601,
    EpochMillis,
    EpochSeconds,
}

impl TimestampUnit {
    /// Canonical columns converted for this unit.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            TimestampUnit::EpochMillis => &[TRADE_TIME, EVENT_TIME],
            TimestampUnit::Iso8601 | TimestampUnit::EpochSeconds => &[TRADE_TIME],
        }
    }
}

#[derive(Debug)]
pub struct ExchangeSchema {
    pub exchange: &'static str,
    pub message_type: &'static str,
    pub example_symbols: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub envelope: Envelope,
    pub timestamps: TimestampUnit,
}

impl ExchangeSchema {
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn position(&self, raw: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.raw == raw)
    }

    pub fn field(&self, raw: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.raw == raw)
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.canonical)
    }

    pub fn raw_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.raw)
    }
}

/// Looks up the schema for `exchange`.
pub fn schema_for(exchange: &str) -> Result<&'static ExchangeSchema> {
    SCHEMAS
        .iter()
        .find(|schema| schema.exchange == exchange)
        .ok_or_else(|| Error::UnknownExchange {
            exchange: exchange.to_string(),
            supported: exchanges().collect::<Vec<_>>().join(", "),
        })
}

/// Message type to request from the replay service for `exchange`.
pub fn requested_message_type(exchange: &str) -> Result<&'static str> {
    schema_for(exchange).map(|schema| schema.message_type)
}

pub fn exchanges() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|schema| schema.exchange)
}

//! Trade record extraction from raw captured lines.
//!
//! A captured line is `<local timestamp> <json message>`. The JSON shape depends
//! on the exchange; the [`Envelope`] variant chosen in the schema registry tells
//! the extractor where the trade records live, so no per-line shape detection
//! happens here.

use std::fmt;

use serde_json::{Map, Number, Value};

use crate::error::Result;
use crate::schema::{schema_for, Envelope, ExchangeSchema};

/// Untyped raw value as it appeared in the message.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => Scalar::Number(n),
            Value::String(s) => Scalar::Str(s),
            nested => Scalar::Str(nested.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// One trade event: raw field names in message order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, Scalar)>,
}

impl RawRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: Scalar) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for RawRecord {
    type Item = (String, Scalar);
    type IntoIter = std::vec::IntoIter<(String, Scalar)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// A line that neither JSON decoder accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    pub reason: String,
}

impl fmt::Display for MalformedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for MalformedLine {}

#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor {
    schema: &'static ExchangeSchema,
}

impl RecordExtractor {
    pub fn new(schema: &'static ExchangeSchema) -> Self {
        Self { schema }
    }

    pub fn for_exchange(exchange: &str) -> Result<Self> {
        schema_for(exchange).map(Self::new)
    }

    pub fn schema(&self) -> &'static ExchangeSchema {
        self.schema
    }

    /// Decodes one captured line and returns its trade records.
    pub fn extract(&self, line: &[u8]) -> std::result::Result<Records, MalformedLine> {
        let payload = message_payload(line);
        if payload.is_empty() {
            return Ok(Records::empty());
        }
        let message = decode(payload)?;
        Ok(self.records_from(message))
    }

    /// Locates the trade records inside an already decoded message.
    pub fn records_from(&self, message: Value) -> Records {
        match self.schema.envelope {
            Envelope::Generic { inject } => {
                let Value::Object(mut envelope) = message else {
                    return Records::empty();
                };
                let injected = inject.map(|inj| {
                    let value = envelope
                        .get(inj.source)
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new()));
                    (inj.target, value)
                });
                match envelope.remove("data") {
                    Some(data) => Records::new(data, injected, &[]),
                    None => Records::empty(),
                }
            }
            Envelope::NestedTick {
                inject,
                strip_prefix,
                strip_suffix,
            } => {
                let Value::Object(mut envelope) = message else {
                    return Records::empty();
                };
                let Some(Value::Object(mut tick)) = envelope.remove("tick") else {
                    return Records::empty();
                };
                let Some(data) = tick.remove("data") else {
                    return Records::empty();
                };
                // Missing `ch` injects "", same as the generic envelopes.
                let channel = envelope
                    .get(inject.source)
                    .and_then(Value::as_str)
                    .map(|ch| strip_channel(ch, strip_prefix, strip_suffix))
                    .unwrap_or_default();
                Records::new(data, Some((inject.target, Value::String(channel))), &[])
            }
            Envelope::NestedParams { prune } => {
                let Value::Object(mut envelope) = message else {
                    return Records::empty();
                };
                let Some(Value::Object(mut params)) = envelope.remove("params") else {
                    return Records::empty();
                };
                match params.remove("data") {
                    Some(data) => Records::new(data, None, prune),
                    None => Records::empty(),
                }
            }
            Envelope::FlatTyped {
                discriminator,
                trade_value,
            } => {
                let is_trade = match &message {
                    Value::Object(map) => {
                        map.get(discriminator).and_then(Value::as_str) == Some(trade_value)
                    }
                    _ => false,
                };
                if is_trade {
                    Records::new(message, None, &[])
                } else {
                    Records::empty()
                }
            }
            Envelope::PositionalArray {
                channel_tag,
                tag_index,
                rows_index,
                symbol_index,
                positions,
                symbol_field,
            } => {
                let Value::Array(mut outer) = message else {
                    return Records::empty();
                };
                if outer.get(tag_index).and_then(Value::as_str) != Some(channel_tag) {
                    return Records::empty();
                }
                let symbol = outer.get(symbol_index).cloned().unwrap_or(Value::Null);
                let Some(Value::Array(rows)) = outer.get_mut(rows_index).map(Value::take) else {
                    return Records::empty();
                };
                let items = rows
                    .into_iter()
                    .map(|row| positional_record(row, positions, symbol_field, &symbol))
                    .collect();
                Records::from_items(items, None, &[])
            }
        }
    }
}

/// Lazy, single-use sequence of records extracted from one line.
#[derive(Debug)]
pub struct Records {
    items: std::vec::IntoIter<Value>,
    inject: Option<(&'static str, Value)>,
    prune: &'static [&'static str],
}

impl Records {
    fn empty() -> Self {
        Self::from_items(Vec::new(), None, &[])
    }

    fn new(
        data: Value,
        inject: Option<(&'static str, Value)>,
        prune: &'static [&'static str],
    ) -> Self {
        let items = match data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        Self::from_items(items, inject, prune)
    }

    fn from_items(
        items: Vec<Value>,
        inject: Option<(&'static str, Value)>,
        prune: &'static [&'static str],
    ) -> Self {
        Self {
            items: items.into_iter(),
            inject,
            prune,
        }
    }
}

impl Iterator for Records {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        for item in self.items.by_ref() {
            // Heartbeats and control messages carry no fields.
            let Value::Object(map) = item else {
                continue;
            };
            let mut record = RawRecord::with_capacity(map.len() + 1);
            for (key, value) in map {
                if self.prune.contains(&key.as_str()) {
                    continue;
                }
                record.push(key, Scalar::from(value));
            }
            if record.is_empty() {
                continue;
            }
            if let Some((target, value)) = &self.inject {
                if !record.contains(target) {
                    record.push(*target, Scalar::from(value.clone()));
                }
            }
            return Some(record);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.items.size_hint().1)
    }
}

fn positional_record(
    row: Value,
    positions: &[&str],
    symbol_field: &str,
    symbol: &Value,
) -> Value {
    let Value::Array(cells) = row else {
        return Value::Null;
    };
    if cells.is_empty() {
        return Value::Null;
    }
    let mut map = Map::with_capacity(positions.len() + 1);
    for (name, cell) in positions.iter().zip(cells) {
        map.insert((*name).to_string(), cell);
    }
    map.insert(symbol_field.to_string(), symbol.clone());
    Value::Object(map)
}

fn strip_channel(channel: &str, prefix: &str, suffix: &str) -> String {
    channel
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .unwrap_or(channel)
        .to_string()
}

/// Drops the capture's local-timestamp prefix, if present.
fn message_payload(line: &[u8]) -> &[u8] {
    let line = line.trim_ascii();
    match line.first() {
        Some(b'{') | Some(b'[') | None => line,
        Some(_) => match line.iter().position(|b| *b == b' ') {
            Some(pos) => line[pos + 1..].trim_ascii_start(),
            None => line,
        },
    }
}

fn decode(payload: &[u8]) -> std::result::Result<Value, MalformedLine> {
    // simd-json parses in place, so the fallback needs the untouched bytes.
    let mut scratch = payload.to_vec();
    match simd_json::from_slice::<Value>(&mut scratch) {
        Ok(value) => Ok(value),
        Err(fast) => serde_json::from_slice(payload).map_err(|err| MalformedLine {
            reason: format!("{err} (simd-json: {fast})"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(exchange: &str, line: &str) -> Vec<RawRecord> {
        RecordExtractor::for_exchange(exchange)
            .expect("known exchange")
            .extract(line.as_bytes())
            .expect("well formed line")
            .collect()
    }

    fn text(record: &RawRecord, key: &str) -> String {
        match record.get(key) {
            Some(Scalar::Str(s)) => s.clone(),
            other => panic!("{key} is not a string: {other:?}"),
        }
    }

    #[test]
    fn strips_local_timestamp_prefix() {
        let line = r#"2020-09-01T00:00:00.1234567Z {"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT"}}"#;
        let records = extract("binance", line);
        assert_eq!(records.len(), 1);
        assert_eq!(text(&records[0], "s"), "BTCUSDT");
    }

    #[test]
    fn parses_unprefixed_json_with_spaces() {
        let line = r#"{"stream": "btcusdt@trade", "data": {"e": "trade", "s": "BTCUSDT"}}"#;
        assert_eq!(extract("binance", line).len(), 1);
    }

    #[test]
    fn generic_list_keeps_message_key_order() {
        let line = r#"t {"table":"swap/trade","data":[{"timestamp":"x","side":"buy","price":"1"},{"side":"sell"}]}"#;
        let records = extract("okex-swap", line);
        assert_eq!(records.len(), 2);
        let keys: Vec<_> = records[0].keys().collect();
        assert_eq!(keys, vec!["timestamp", "side", "price"]);
    }

    #[test]
    fn ftx_symbol_comes_from_market() {
        let line = r#"t {"channel":"trades","market":"BTC-PERP","type":"update","data":[{"id":1,"price":10.5},{"id":2,"price":11.0}]}"#;
        let records = extract("ftx", line);
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(text(record, "symbol"), "BTC-PERP");
        }

        let missing = r#"t {"channel":"trades","type":"update","data":[{"id":1}]}"#;
        assert_eq!(text(&extract("ftx", missing)[0], "symbol"), "");
    }

    #[test]
    fn huobi_channel_is_stripped_to_symbol() {
        let line = r#"t {"ch":"market.btcusdt.trade.detail","ts":1,"tick":{"id":1,"ts":1,"data":[{"id":5,"price":1.5}]}}"#;
        let records = extract("huobi", line);
        assert_eq!(text(&records[0], "ch"), "btcusdt");

        let undecorated = r#"t {"ch":"btcusdt","tick":{"data":{"id":5}}}"#;
        assert_eq!(text(&extract("huobi", undecorated)[0], "ch"), "btcusdt");
    }

    #[test]
    fn huobi_without_channel_gets_empty_symbol() {
        let single = r#"t {"tick":{"data":{"id":5,"price":1.5}}}"#;
        let list = r#"t {"tick":{"data":[{"id":5},{"id":6}]}}"#;
        for line in [single, list] {
            let records = extract("huobi", line);
            assert!(!records.is_empty());
            for record in &records {
                assert_eq!(text(record, "ch"), "");
            }
        }
    }

    #[test]
    fn deribit_noisy_fields_are_pruned() {
        let line = r#"t {"jsonrpc":"2.0","method":"subscription","params":{"channel":"trades.ETH-PERPETUAL.raw","data":[{"trade_seq":1,"liquidation":"T","price":433.8,"block_trade_id":"154"}]}}"#;
        let records = extract("deribit", line);
        assert_eq!(records.len(), 1);
        assert!(!records[0].contains("liquidation"));
        assert!(!records[0].contains("block_trade_id"));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn coinbase_only_matches_are_trades() {
        let matched = r#"t {"type":"match","trade_id":1,"price":"10.0"}"#;
        assert_eq!(extract("coinbase", matched).len(), 1);

        let received = r#"t {"type":"received","order_id":"abc"}"#;
        assert!(extract("coinbase", received).is_empty());
    }

    #[test]
    fn kraken_rows_are_named_by_position() {
        let line = r#"t [0,[["5541.2","0.15","1534614057.321597","s","l",""],["5542.0","1.0","1534614058.000001","b","m",""]],"trade","XBT/USD"]"#;
        let records = extract("kraken", line);
        assert_eq!(records.len(), 2);
        let keys: Vec<_> = records[0].keys().collect();
        assert_eq!(
            keys,
            vec!["price", "volume", "time", "side", "orderType", "misc", "symbol"]
        );
        assert_eq!(text(&records[1], "time"), "1534614058.000001");
        assert_eq!(text(&records[1], "symbol"), "XBT/USD");
    }

    #[test]
    fn kraken_non_trade_channels_are_ignored() {
        let line = r#"t [0,{"a":["5541.3",1,"1.0"]},"ticker","XBT/USD"]"#;
        assert!(extract("kraken", line).is_empty());
        assert!(extract("kraken", r#"t {"event":"heartbeat"}"#).is_empty());
    }

    #[test]
    fn heartbeats_and_empty_data_yield_nothing() {
        assert!(extract("bitmex", r#"t {"table":"trade","action":"partial","data":[]}"#).is_empty());
        assert!(extract("bitmex", r#"t {"info":"Welcome"}"#).is_empty());
        assert!(extract("bitmex", r#"t {"table":"trade","data":[{}]}"#).is_empty());
        assert!(extract("bitmex", "").is_empty());
    }

    #[test]
    fn malformed_line_is_reported() {
        let extractor = RecordExtractor::for_exchange("bitmex").unwrap();
        let err = extractor
            .extract(br#"t {"table":"trade","data":[{"price":1"#)
            .unwrap_err();
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn large_identifiers_keep_their_digits() {
        let line = r#"t {"ch":"market.btcusdt.trade.detail","tick":{"data":[{"id":10918322615512345678}]}}"#;
        let records = extract("huobi", line);
        assert_eq!(
            records[0].get("id").map(ToString::to_string).as_deref(),
            Some("10918322615512345678")
        );
    }
}

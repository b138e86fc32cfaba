mod common;

use tardis_norm::extract::{RecordExtractor, Scalar};
use tardis_norm::schema::{exchanges, schema_for};

use common::{captured, sample_message};

#[test]
fn every_exchange_sample_extracts_known_fields() {
    for exchange in exchanges() {
        let schema = schema_for(exchange).unwrap();
        let extractor = RecordExtractor::new(schema);
        let line = captured(sample_message(exchange));
        let records: Vec<_> = extractor.extract(line.as_bytes()).unwrap().collect();
        assert_eq!(records.len(), 1, "{exchange}");
        for record in &records {
            assert!(!record.is_empty(), "{exchange}");
            for key in record.keys() {
                assert!(
                    schema.field(key).is_some(),
                    "{exchange}: unexpected field {key}"
                );
            }
        }
    }
}

#[test]
fn deribit_noise_fields_are_pruned() {
    let extractor = RecordExtractor::for_exchange("deribit").unwrap();
    let line = captured(sample_message("deribit"));
    let record = extractor.extract(line.as_bytes()).unwrap().next().unwrap();
    assert!(!record.contains("liquidation"));
    assert!(!record.contains("block_trade_id"));
    assert!(record.contains("trade_seq"));
}

#[test]
fn channel_symbols_are_injected() {
    let cases = [
        ("huobi", "ch", "btcusdt"),
        ("huobi-dm", "ch", "BTC_CW"),
        ("huobi-dm-swap", "ch", "BTC-USD"),
        ("ftx", "symbol", "BTC-PERP"),
        ("kraken", "symbol", "XBT/USD"),
    ];
    for (exchange, field, symbol) in cases {
        let extractor = RecordExtractor::for_exchange(exchange).unwrap();
        let line = captured(sample_message(exchange));
        let record = extractor.extract(line.as_bytes()).unwrap().next().unwrap();
        assert_eq!(
            record.get(field),
            Some(&Scalar::Str(symbol.to_string())),
            "{exchange}"
        );
    }
}

#[test]
fn large_huobi_ids_keep_every_digit() {
    let extractor = RecordExtractor::for_exchange("huobi").unwrap();
    let line = captured(sample_message("huobi"));
    let record = extractor.extract(line.as_bytes()).unwrap().next().unwrap();
    assert_eq!(
        record.get("id").map(ToString::to_string).as_deref(),
        Some("10918322615512345678")
    );
}

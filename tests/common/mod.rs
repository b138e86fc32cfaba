#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

pub const LOCAL_TS: &str = "2020-09-01T00:00:00.1234567Z";

/// One captured trade message per exchange, without the local timestamp.
pub fn sample_message(exchange: &str) -> &'static str {
    match exchange {
        "bitmex" => {
            r#"{"table":"trade","action":"insert","data":[{"timestamp":"2019-10-01T00:00:06.425Z","symbol":"XBTUSD","side":"Sell","size":100,"price":8289.5,"tickDirection":"MinusTick","trdMatchID":"4c2f7c08-7a4e-1d9f-37c4-e2a2f5a6b7c8","grossValue":1206350,"homeNotional":0.0120635,"foreignNotional":100}]}"#
        }
        "binance" => {
            r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1569888000123,"s":"BTCUSDT","t":187556123,"p":"8289.01","q":"0.10000000","b":680123,"a":680124,"T":1569888000120,"m":true,"M":true}}"#
        }
        "binance-futures" => {
            r#"{"stream":"ethusdt@trade","data":{"e":"trade","E":1598918400123,"T":1598918400120,"s":"ETHUSDT","t":262343,"p":"434.50","q":"1.200","X":"MARKET","m":false}}"#
        }
        "binance-delivery" => {
            r#"{"stream":"btcusd_200925@trade","data":{"e":"trade","E":1598918400223,"T":1598918400220,"s":"BTCUSD_200925","t":5521,"p":"11700.1","q":"3","X":"MARKET","m":true}}"#
        }
        "okex-swap" => {
            r#"{"table":"swap/trade","data":[{"side":"buy","trade_id":"1234567","price":"11650.1","size":"5","instrument_id":"BTC-USD-SWAP","timestamp":"2020-09-01T00:00:00.123Z"}]}"#
        }
        "okex-futures" => {
            r#"{"table":"futures/trade","data":[{"side":"sell","trade_id":"7654321","price":"7180.5","qty":"2","instrument_id":"BTC-USD-200103","timestamp":"2020-01-01T00:00:00.500Z"}]}"#
        }
        "huobi" => {
            r#"{"ch":"market.btcusdt.trade.detail","ts":1598918400200,"tick":{"id":100123,"ts":1598918400190,"data":[{"id":10918322615512345678,"ts":1598918400190,"tradeId":100123,"amount":0.01,"price":11650.1,"direction":"buy"}]}}"#
        }
        "huobi-dm" => {
            r#"{"ch":"market.BTC_CW.trade.detail","ts":1598918400300,"tick":{"id":2001,"ts":1598918400290,"data":[{"amount":2,"quantity":0.0171,"ts":1598918400290,"id":2001000,"price":11680.5,"direction":"sell"}]}}"#
        }
        "huobi-dm-swap" => {
            r#"{"ch":"market.BTC-USD.trade.detail","ts":1598918400400,"tick":{"id":3001,"ts":1598918400390,"data":[{"amount":4,"quantity":0.0343,"ts":1598918400390,"id":3001000,"price":11660.0,"direction":"buy"}]}}"#
        }
        "ftx" => {
            r#"{"channel":"trades","market":"BTC-PERP","type":"update","data":[{"id":97653,"price":11650.5,"size":0.1,"side":"buy","liquidation":false,"time":"2020-09-01T00:00:00.123456+00:00"}]}"#
        }
        "coinbase" => {
            r#"{"type":"match","trade_id":102345,"maker_order_id":"ac928c66-ca53-498f-9c13-a110027a60e8","taker_order_id":"132fb6ae-456b-4654-b4e0-d681ac05cea1","side":"sell","size":"0.10000000","price":"11650.10","product_id":"BTC-USD","sequence":17123456789,"time":"2020-09-01T00:00:00.123000Z"}"#
        }
        "deribit" => {
            r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"trades.ETH-PERPETUAL.raw","data":[{"trade_seq":1966031,"trade_id":"ETH-2716745","timestamp":1598918400123,"tick_direction":0,"price":434.5,"mark_price":434.41,"instrument_name":"ETH-PERPETUAL","index_price":434.3,"direction":"buy","amount":10.0,"liquidation":"M","block_trade_id":"154"}]}}"#
        }
        "kraken" => {
            r#"[0,[["11650.10000","0.01250000","1598918400.123456","b","m",""]],"trade","XBT/USD"]"#
        }
        other => panic!("no sample for {other}"),
    }
}

/// A captured line: local timestamp, space, message.
pub fn captured(message: &str) -> String {
    format!("{LOCAL_TS} {message}")
}

pub fn kraken_trade(price: &str, time: &str) -> String {
    captured(&format!(
        r#"[0,[["{price}","0.50000000","{time}","s","l",""]],"trade","XBT/USD"]"#
    ))
}

pub fn heartbeat() -> String {
    captured(r#"{"event":"heartbeat"}"#)
}

pub fn write_gz_lines(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap();
}

/// Writes each `(relative path, lines)` slice under `root`.
pub fn write_capture(root: &Path, slices: &[(&str, Vec<String>)]) {
    for (rel, lines) in slices {
        write_gz_lines(&root.join(rel), lines);
    }
}

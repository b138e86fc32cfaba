use super::ScalarType::{Bool, Float, Int, Str};
use super::{field, Envelope, ExchangeSchema, FieldSpec, SymbolInjection, TimestampUnit};

const GENERIC: Envelope = Envelope::Generic { inject: None };

const HUOBI_TICK: Envelope = Envelope::NestedTick {
    inject: SymbolInjection {
        source: "ch",
        target: "ch",
    },
    strip_prefix: "market.",
    strip_suffix: ".trade.detail",
};

const BINANCE_SPOT_FIELDS: &[FieldSpec] = &[
    field("e", "evt_type", Str),
    field("E", "evt_time", Int),
    field("s", "symbol", Str),
    field("t", "trd_id", Int),
    field("p", "px", Float),
    field("q", "qty", Float),
    field("b", "buyer_order_id", Int),
    field("a", "seller_order_id", Int),
    field("T", "trd_time", Int),
    field("m", "is_buyer_mkt_mkr?", Bool),
    field("M", "ignore", Bool),
];

const BINANCE_DERIVATIVE_FIELDS: &[FieldSpec] = &[
    field("e", "evt_type", Str),
    field("E", "evt_time", Int),
    field("T", "trd_time", Int),
    field("s", "symbol", Str),
    field("t", "trd_id", Int),
    field("p", "px", Float),
    field("q", "qty", Float),
    field("X", "cur_order_status", Str),
    field("m", "is_buyer_mkt_mkr?", Bool),
];

const HUOBI_DM_FIELDS: &[FieldSpec] = &[
    field("amount", "trd_ntnl", Int),
    field("quantity", "qty", Float),
    field("ts", "trd_time", Int),
    field("id", "trd_id", Int),
    field("price", "px", Float),
    field("direction", "trd_aggr_dir", Str),
    field("ch", "symbol", Str),
];

pub static SCHEMAS: &[ExchangeSchema] = &[
    ExchangeSchema {
        exchange: "bitmex",
        message_type: "trade",
        example_symbols: &["XBTUSD"],
        fields: &[
            field("timestamp", "trd_time", Str),
            field("symbol", "symbol", Str),
            field("side", "trd_side", Str),
            field("size", "qty", Int),
            field("price", "px", Float),
            field("tickDirection", "tick_dir", Str),
            field("trdMatchID", "trd_match_id", Str),
            field("grossValue", "gross_val", Int),
            field("homeNotional", "home_ntnl", Float),
            field("foreignNotional", "foreign_ntnl", Float),
        ],
        envelope: GENERIC,
        timestamps: TimestampUnit::Iso8601,
    },
    ExchangeSchema {
        exchange: "binance",
        message_type: "trade",
        example_symbols: &["btcusdt"],
        fields: BINANCE_SPOT_FIELDS,
        envelope: GENERIC,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "binance-futures",
        message_type: "trade",
        example_symbols: &["ethusdt"],
        fields: BINANCE_DERIVATIVE_FIELDS,
        envelope: GENERIC,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "binance-delivery",
        message_type: "trade",
        example_symbols: &["btcusd_200925"],
        fields: BINANCE_DERIVATIVE_FIELDS,
        envelope: GENERIC,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "okex-swap",
        message_type: "swap/trade",
        example_symbols: &["BTC-USD-SWAP"],
        fields: &[
            field("side", "trd_side", Str),
            field("trade_id", "trd_id", Str),
            field("price", "px", Float),
            field("size", "qty", Float),
            field("instrument_id", "symbol", Str),
            field("timestamp", "trd_time", Str),
        ],
        envelope: GENERIC,
        timestamps: TimestampUnit::Iso8601,
    },
    ExchangeSchema {
        exchange: "okex-futures",
        message_type: "futures/trade",
        example_symbols: &["BTC-USD-200103"],
        fields: &[
            field("side", "trd_side", Str),
            field("trade_id", "trd_id", Str),
            field("price", "px", Float),
            field("qty", "qty", Float),
            field("instrument_id", "symbol", Str),
            field("timestamp", "trd_time", Str),
        ],
        envelope: GENERIC,
        timestamps: TimestampUnit::Iso8601,
    },
    ExchangeSchema {
        exchange: "huobi",
        message_type: "trade",
        example_symbols: &["btcusdt"],
        fields: &[
            field("id", "ord_id", Str),
            field("ts", "trd_time", Int),
            field("tradeId", "trd_id", Int),
            field("amount", "qty", Float),
            field("price", "px", Float),
            field("direction", "trd_aggr_dir", Str),
            field("ch", "symbol", Str),
        ],
        envelope: HUOBI_TICK,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "huobi-dm",
        message_type: "trade",
        example_symbols: &["BTC_CW"],
        fields: HUOBI_DM_FIELDS,
        envelope: HUOBI_TICK,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "huobi-dm-swap",
        message_type: "trade",
        example_symbols: &["BTC-USD"],
        fields: HUOBI_DM_FIELDS,
        envelope: HUOBI_TICK,
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "ftx",
        message_type: "trades",
        example_symbols: &["BTC-PERP"],
        fields: &[
            field("id", "trd_id", Int),
            field("price", "px", Float),
            field("size", "qty", Float),
            field("side", "trd_aggr_dir", Str),
            field("liquidation", "is_liq?", Bool),
            field("time", "trd_time", Str),
            field("symbol", "symbol", Str),
        ],
        envelope: Envelope::Generic {
            inject: Some(SymbolInjection {
                source: "market",
                target: "symbol",
            }),
        },
        timestamps: TimestampUnit::Iso8601,
    },
    ExchangeSchema {
        exchange: "coinbase",
        message_type: "match",
        example_symbols: &["BTC-USD"],
        fields: &[
            field("type", "msg_type", Str),
            field("side", "mkt_mkr_dir", Str),
            field("product_id", "symbol", Str),
            field("time", "trd_time", Str),
            field("sequence", "trd_sequence_no", Int),
            field("trade_id", "trd_id", Int),
            field("maker_order_id", "maker_ord_id", Str),
            field("taker_order_id", "taker_ord_id", Str),
            field("size", "qty", Float),
            field("price", "px", Float),
        ],
        envelope: Envelope::FlatTyped {
            discriminator: "type",
            trade_value: "match",
        },
        timestamps: TimestampUnit::Iso8601,
    },
    ExchangeSchema {
        exchange: "deribit",
        message_type: "trades",
        example_symbols: &["ETH-PERPETUAL"],
        fields: &[
            field("trade_seq", "trd_seq", Int),
            field("trade_id", "trd_id", Str),
            field("timestamp", "trd_time", Int),
            field("tick_direction", "tick_dir", Int),
            field("price", "px", Float),
            field("mark_price", "mkt_px", Float),
            field("instrument_name", "symbol", Str),
            field("index_price", "idx_px", Float),
            field("direction", "trd_ntnl", Str),
            field("amount", "qty", Float),
        ],
        envelope: Envelope::NestedParams {
            prune: &["liquidation", "block_trade_id"],
        },
        timestamps: TimestampUnit::EpochMillis,
    },
    ExchangeSchema {
        exchange: "kraken",
        message_type: "trade",
        example_symbols: &["XBT/USD"],
        fields: &[
            field("price", "px", Float),
            field("volume", "qty", Float),
            field("time", "trd_time", Str),
            field("side", "trd_dir", Str),
            field("orderType", "trig_ord_type", Str),
            field("misc", "mkt_px", Str),
            field("symbol", "symbol", Str),
        ],
        envelope: Envelope::PositionalArray {
            channel_tag: "trade",
            tag_index: 2,
            rows_index: 1,
            symbol_index: 3,
            positions: &["price", "volume", "time", "side", "orderType", "misc"],
            symbol_field: "symbol",
        },
        timestamps: TimestampUnit::EpochSeconds,
    },
];

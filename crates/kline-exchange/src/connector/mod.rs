//! 거래소 커넥터.

pub mod binance;

pub use binance::{parse_klines, BinanceConfig, BinanceKlineSource, KLINES_ENDPOINT};

//! Binance 캔들(klines) REST 커넥터.
//!
//! `GET /api/v3/klines`는 12개 필드 배열의 JSON 배열을 반환합니다:
//!
//! ```text
//! [open_time, open, high, low, close, volume, close_time, quote_volume,
//!  trade_count, taker_buy_base, taker_buy_quote, ignore]
//! ```
//!
//! 앞의 6개 필드만 사용하고 나머지는 버립니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use kline_core::{parse_decimal_str, Candle, ExchangeSettings, FetchWindow};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::http::RetryingHttpClient;
use crate::retry::RetryConfig;
use crate::traits::KlineSource;
use crate::{ExchangeError, ExchangeResult};

/// 캔들 조회 엔드포인트.
pub const KLINES_ENDPOINT: &str = "/api/v3/klines";

/// 사용하는 필드 수 (open_time ~ volume).
const CONSUMED_FIELDS: usize = 6;

// ============================================================================
// 설정
// ============================================================================

/// Binance 캔들 소스 설정.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BinanceConfig {
    /// 설정 파일의 `[exchange]` 섹션에서 생성합니다.
    pub fn from_settings(settings: &ExchangeSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }

    /// 기본 URL 변경 (테스트 서버, 미러 등).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 캔들 엔드포인트 전체 URL.
    pub fn klines_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), KLINES_ENDPOINT)
    }
}

// ============================================================================
// 캔들 소스
// ============================================================================

/// Binance 공개 API 캔들 소스 (인증 불필요).
pub struct BinanceKlineSource {
    config: BinanceConfig,
    http: RetryingHttpClient,
}

impl BinanceKlineSource {
    /// 새 소스 생성.
    pub fn new(config: BinanceConfig, retry: RetryConfig) -> ExchangeResult<Self> {
        let http = RetryingHttpClient::new(Duration::from_secs(config.timeout_secs), retry)?;
        Ok(Self { config, http })
    }

    /// 요청 파라미터 생성.
    fn build_params(window: &FetchWindow, limit: u32) -> Vec<(&'static str, String)> {
        vec![
            ("symbol", window.symbol.clone()),
            ("interval", window.timeframe.to_binance_interval().to_string()),
            ("startTime", window.start.timestamp_millis().to_string()),
            ("endTime", window.end.timestamp_millis().to_string()),
            ("limit", limit.to_string()),
        ]
    }
}

#[async_trait]
impl KlineSource for BinanceKlineSource {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_window(
        &self,
        window: &FetchWindow,
        limit: u32,
        cancel: &CancellationToken,
    ) -> ExchangeResult<Vec<Candle>> {
        let params = Self::build_params(window, limit);
        let body = self.http.get(&self.config.klines_url(), &params, cancel).await?;
        parse_klines(&body)
    }
}

// ============================================================================
// 응답 파싱
// ============================================================================

/// 캔들 응답 본문을 파싱합니다.
///
/// 최상위가 배열이 아니면 `ParseError`. 개별 행이 깨져 있으면 그 행만 버립니다.
pub fn parse_klines(body: &str) -> ExchangeResult<Vec<Candle>> {
    let value: Value = serde_json::from_str(body)?;

    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(obj) => {
            // 200 응답에 에러 객체가 오는 경우
            if let (Some(code), Some(msg)) = (obj.get("code"), obj.get("msg")) {
                return Err(ExchangeError::ApiError {
                    code: code.as_i64().unwrap_or_default(),
                    message: msg.as_str().unwrap_or_default().to_string(),
                });
            }
            return Err(ExchangeError::ParseError("expected JSON array of klines".to_string()));
        }
        other => {
            return Err(ExchangeError::ParseError(format!(
                "expected JSON array of klines, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = rows.len();
    let candles: Vec<Candle> = rows.iter().filter_map(parse_row).collect();

    if candles.len() < total {
        warn!(
            total,
            parsed = candles.len(),
            skipped = total - candles.len(),
            "형식이 잘못된 캔들 행 무시"
        );
    } else {
        debug!(rows = total, "캔들 파싱 완료");
    }

    Ok(candles)
}

/// 한 행을 캔들로 변환합니다. 필드가 부족하거나 숫자가 아니면 `None`.
fn parse_row(row: &Value) -> Option<Candle> {
    let fields = row.as_array()?;
    if fields.len() < CONSUMED_FIELDS {
        return None;
    }

    let open_time_ms = match &fields[0] {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let open_time = DateTime::from_timestamp_millis(open_time_ms)?;

    Some(Candle {
        open_time,
        open: value_to_decimal(&fields[1])?,
        high: value_to_decimal(&fields[2])?,
        low: value_to_decimal(&fields[3])?,
        close: value_to_decimal(&fields[4])?,
        volume: value_to_decimal(&fields[5])?,
    })
}

/// 문자열 또는 숫자 JSON 값을 Decimal로 변환.
fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal_str(s),
        Value::Number(n) => parse_decimal_str(&n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kline_core::Timeframe;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_klines_consumes_first_six_fields() {
        let body = r#"[
            [1704067200000, "42283.58", "42554.57", "42261.02", "42475.23", "1271.68108",
             1704070799999, "53957248.97", 47134, "682.57581", "28957416.82", "0"],
            [1704070800000, "42475.23", "42775.00", "42431.65", "42613.56", "1196.37856",
             1704074399999, "50984976.49", 44482, "587.68945", "25043925.57", "0"]
        ]"#;

        let candles = parse_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0].open_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(candles[0].open, dec!(42283.58));
        assert_eq!(candles[1].volume, dec!(1196.37856));
    }

    #[test]
    fn test_parse_klines_skips_malformed_rows() {
        let body = r#"[
            [1704067200000, "1", "2", "0.5", "1.5", "10"],
            [1704070800000, "abc", "2", "0.5", "1.5", "10"],
            [1704074400000, "1"],
            "garbage",
            [1704078000000, 1.0, 2.5, 0.5, 1.5, 10]
        ]"#;

        let candles = parse_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].high, dec!(2.5));
    }

    #[test]
    fn test_parse_klines_rejects_unexpected_shape() {
        assert!(matches!(
            parse_klines(r#"{"unexpected": true}"#),
            Err(ExchangeError::ParseError(_))
        ));
        assert!(matches!(
            parse_klines(r#"{"code": -1121, "msg": "Invalid symbol."}"#),
            Err(ExchangeError::ApiError { code: -1121, .. })
        ));
        assert!(parse_klines("not json").is_err());
    }

    #[test]
    fn test_build_params() {
        let window = FetchWindow {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        let params = BinanceKlineSource::build_params(&window, 1000);
        assert_eq!(params[0], ("symbol", "BTCUSDT".to_string()));
        assert_eq!(params[1], ("interval", "1h".to_string()));
        assert_eq!(params[2], ("startTime", "1704067200000".to_string()));
        assert_eq!(params[3], ("endTime", "1704153600000".to_string()));
        assert_eq!(params[4], ("limit", "1000".to_string()));
    }

    #[test]
    fn test_klines_url_trims_trailing_slash() {
        let config = BinanceConfig::default().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.klines_url(), "http://127.0.0.1:9000/api/v3/klines");
    }
}

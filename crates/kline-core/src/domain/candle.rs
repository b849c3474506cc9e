//! OHLCV 캔들과 시리즈 식별자.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Price, Quantity, Timeframe};

/// OHLCV 캔들스틱 데이터.
///
/// 한 시리즈 안에서 `open_time`은 엄격히 증가하며 중복되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간 (밀리초 정밀도)
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        open_time: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 정렬/중복 제거 키 (epoch 밀리초).
    pub fn open_time_ms(&self) -> i64 {
        self.open_time.timestamp_millis()
    }
}

/// 시리즈 식별자: (심볼, 타임프레임).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// 거래소 심볼 (예: "BTCUSDT")
    pub symbol: String,
    /// 캔들 간격
    pub timeframe: Timeframe,
}

impl SeriesKey {
    /// 새 식별자를 생성합니다. 심볼은 대문자로 정규화됩니다.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            timeframe,
        }
    }

    /// 영속 파일 이름 stem (예: "BTCUSDT_1h").
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.symbol, self.timeframe.file_tag())
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

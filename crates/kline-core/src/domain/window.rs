//! 페이지 한도로 제한된 조회 윈도우.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Timeframe;

/// 한 번의 REST 요청이 담당하는 조회 구간 (양 끝 포함).
///
/// 생성한 조회 호출이 단독으로 소유하며 사용 후 버려집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// 거래소 심볼
    pub symbol: String,
    /// 캔들 간격
    pub timeframe: Timeframe,
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,
    /// 종료 시각 (포함)
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// 윈도우 폭.
    pub fn span(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// 이 윈도우가 반환할 수 있는 최대 캔들 수.
    pub fn max_candles(&self) -> i64 {
        self.span().num_milliseconds() / self.timeframe.as_millis() + 1
    }

    /// `open_time`이 이 윈도우에 속하는지 확인합니다.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{} ~ {}]",
            self.symbol,
            self.timeframe,
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

//! 캔들스틱 데이터를 위한 타임프레임 정의.
//!
//! 타임프레임은 캔들 간격이자 윈도우 분할/갭 판정의 기준 단위입니다.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1분봉
    #[serde(rename = "1m")]
    M1,
    /// 3분봉
    #[serde(rename = "3m")]
    M3,
    /// 5분봉
    #[serde(rename = "5m")]
    M5,
    /// 15분봉
    #[serde(rename = "15m")]
    M15,
    /// 30분봉
    #[serde(rename = "30m")]
    M30,
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
    /// 2시간봉
    #[serde(rename = "2h")]
    H2,
    /// 4시간봉
    #[serde(rename = "4h")]
    H4,
    /// 6시간봉
    #[serde(rename = "6h")]
    H6,
    /// 8시간봉
    #[serde(rename = "8h")]
    H8,
    /// 12시간봉
    #[serde(rename = "12h")]
    H12,
    /// 일봉
    #[serde(rename = "1d")]
    D1,
    /// 3일봉
    #[serde(rename = "3d")]
    D3,
    /// 주봉
    #[serde(rename = "1w")]
    W1,
    /// 월봉
    #[serde(rename = "1M")]
    MN1,
}

impl Timeframe {
    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::from_secs(60),
            Timeframe::M3 => Duration::from_secs(3 * 60),
            Timeframe::M5 => Duration::from_secs(5 * 60),
            Timeframe::M15 => Duration::from_secs(15 * 60),
            Timeframe::M30 => Duration::from_secs(30 * 60),
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H2 => Duration::from_secs(2 * 60 * 60),
            Timeframe::H4 => Duration::from_secs(4 * 60 * 60),
            Timeframe::H6 => Duration::from_secs(6 * 60 * 60),
            Timeframe::H8 => Duration::from_secs(8 * 60 * 60),
            Timeframe::H12 => Duration::from_secs(12 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::D3 => Duration::from_secs(3 * 24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
            Timeframe::MN1 => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 이 타임프레임의 밀리초 단위 값을 반환합니다.
    pub fn as_millis(&self) -> i64 {
        self.duration().as_millis() as i64
    }

    /// chrono 기간으로 변환합니다.
    pub fn to_chrono(&self) -> ChronoDuration {
        ChronoDuration::milliseconds(self.as_millis())
    }

    /// 페이지 한도(`limit`)개의 캔들을 담는 윈도우의 최대 폭.
    ///
    /// 시작/종료 시각이 모두 포함되므로 `limit`개 캔들의 폭은 `(limit - 1) * 간격`입니다.
    pub fn window_span(&self, limit: u32) -> ChronoDuration {
        ChronoDuration::milliseconds(self.as_millis() * i64::from(limit.max(1) - 1))
    }

    /// 바이낸스 간격 문자열로 변환합니다.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// 바이낸스 간격 문자열에서 파싱합니다.
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "3m" => Some(Timeframe::M3),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "30m" => Some(Timeframe::M30),
            "1h" => Some(Timeframe::H1),
            "2h" => Some(Timeframe::H2),
            "4h" => Some(Timeframe::H4),
            "6h" => Some(Timeframe::H6),
            "8h" => Some(Timeframe::H8),
            "12h" => Some(Timeframe::H12),
            "1d" => Some(Timeframe::D1),
            "3d" => Some(Timeframe::D3),
            "1w" => Some(Timeframe::W1),
            "1M" => Some(Timeframe::MN1),
            _ => None,
        }
    }

    /// 파일 이름에 쓰는 태그.
    ///
    /// 대소문자를 구분하지 않는 파일시스템에서 "1m"과 "1M"이 충돌하므로 월봉은 "1mo"를 씁니다.
    pub fn file_tag(&self) -> &'static str {
        match self {
            Timeframe::MN1 => "1mo",
            other => other.to_binance_interval(),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_interval())
    }
}

impl FromStr for Timeframe {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s.trim())
            .ok_or_else(|| CoreError::InvalidInput(format!("Invalid timeframe: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.as_millis(), 60_000);
        assert_eq!(Timeframe::H1.as_millis(), 3_600_000);
        assert_eq!(Timeframe::D1.to_chrono(), ChronoDuration::days(1));
    }

    #[test]
    fn test_timeframe_binance() {
        assert_eq!(Timeframe::M15.to_binance_interval(), "15m");
        assert_eq!(Timeframe::from_binance_interval("4h"), Some(Timeframe::H4));
        assert_eq!("1M".parse::<Timeframe>().unwrap(), Timeframe::MN1);
        assert!("2y".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_window_span_scales_with_interval() {
        assert_eq!(Timeframe::M1.window_span(1000), ChronoDuration::minutes(999));
        assert_eq!(Timeframe::D1.window_span(1000), ChronoDuration::days(999));
        assert_eq!(Timeframe::H1.window_span(1), ChronoDuration::zero());
    }

    #[test]
    fn test_file_tag_avoids_case_collision() {
        assert_ne!(Timeframe::M1.file_tag(), Timeframe::MN1.file_tag());
    }

    #[test]
    fn test_serde_uses_interval_strings() {
        let json = serde_json::to_string(&Timeframe::H4).unwrap();
        assert_eq!(json, "\"4h\"");
        let parsed: Timeframe = serde_json::from_str("\"1d\"").unwrap();
        assert_eq!(parsed, Timeframe::D1);
    }
}

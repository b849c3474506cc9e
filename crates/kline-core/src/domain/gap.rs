//! 시리즈 누락 구간.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Timeframe;

/// 인접한 두 캔들 사이의 누락 구간.
///
/// 저장되지 않으며 무결성 검사 때마다 다시 계산됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// 마지막 정상 캔들의 `open_time`
    pub start: DateTime<Utc>,
    /// 다음으로 존재하는 캔들의 `open_time`
    pub end: DateTime<Utc>,
    /// 기대되었으나 없는 캔들 수
    pub missing_units: i64,
}

impl Gap {
    /// 두 경계 사이의 갭을 만듭니다.
    ///
    /// `end <= start`이면 `None`. `missing_units = round((end - start) / 간격) - 1`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>, timeframe: Timeframe) -> Option<Self> {
        if end <= start {
            return None;
        }
        let delta_ms = (end - start).num_milliseconds();
        let units = (delta_ms as f64 / timeframe.as_millis() as f64).round() as i64;

        Some(Self {
            start,
            end,
            missing_units: (units - 1).max(0),
        })
    }

    /// 첫 번째와 마지막 누락 캔들의 예상 `open_time`.
    pub fn missing_range(&self, timeframe: Timeframe) -> (DateTime<Utc>, DateTime<Utc>) {
        let step = timeframe.to_chrono();
        (self.start + step, self.end - step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_gap_between_counts_missing_units() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 10, 10, 0).unwrap();
        let gap = Gap::between(start, end, Timeframe::M1).unwrap();
        assert_eq!(gap.missing_units, 9);

        let (first, last) = gap.missing_range(Timeframe::M1);
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap());
        assert_eq!(last, Utc.with_ymd_and_hms(2024, 1, 1, 10, 9, 0).unwrap());
    }

    #[test]
    fn test_gap_between_rejects_reversed_bounds() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(Gap::between(t, t, Timeframe::H1).is_none());
    }
}

//! 정렬된 캔들 시리즈 연산.
//!
//! 시리즈는 `open_time` 밀리초를 키로 하는 `BTreeMap`으로 병합되므로
//! 결과는 항상 오름차순이며 같은 시각의 캔들은 하나만 남습니다.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kline_core::{Candle, DecimalExt, Timeframe};
use rust_decimal::Decimal;

/// 병합 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// 새로 추가된 캔들 수
    pub inserted: usize,
    /// 기존 시각의 값이 바뀐 캔들 수
    pub updated: usize,
    /// 병합 후 전체 캔들 수
    pub total: usize,
}

impl MergeOutcome {
    /// 시리즈에 변화가 있었는지 확인.
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

/// 기존 시리즈와 새 캔들을 병합합니다.
///
/// 같은 `open_time`이면 새 캔들이 이깁니다. 값이 같은 캔들은 `updated`로 세지 않으므로
/// 같은 입력으로 다시 호출하면 결과도 같고 `changed()`도 false입니다.
pub fn merge_candles(existing: Vec<Candle>, incoming: Vec<Candle>) -> (Vec<Candle>, MergeOutcome) {
    let mut series: BTreeMap<i64, Candle> = existing
        .into_iter()
        .map(|c| (c.open_time_ms(), c))
        .collect();

    let mut outcome = MergeOutcome::default();
    for candle in incoming {
        match series.entry(candle.open_time_ms()) {
            Entry::Occupied(mut slot) => {
                if *slot.get() != candle {
                    slot.insert(candle);
                    outcome.updated += 1;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(candle);
                outcome.inserted += 1;
            }
        }
    }

    outcome.total = series.len();
    (series.into_values().collect(), outcome)
}

/// 시리즈를 정렬하고 중복을 제거합니다 (같은 시각이면 뒤의 값 유지).
///
/// 입력이 이미 정규화되어 있었으면 `false`를 함께 반환합니다.
pub fn normalize_series(candles: Vec<Candle>) -> (Vec<Candle>, bool) {
    let already = candles.windows(2).all(|w| w[0].open_time < w[1].open_time);
    if already {
        return (candles, false);
    }
    let (normalized, _) = merge_candles(Vec::new(), candles);
    (normalized, true)
}

/// 시리즈 범위 요약.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesBounds {
    /// 첫 캔들 시각
    pub first: DateTime<Utc>,
    /// 마지막 캔들 시각
    pub last: DateTime<Utc>,
    /// 저장된 캔들 수
    pub count: usize,
    /// 첫 캔들부터 마지막 캔들까지 기대되는 캔들 수
    pub expected: usize,
}

impl SeriesBounds {
    /// 정렬된 시리즈에서 범위를 계산합니다. 비어 있으면 `None`.
    pub fn from_series(candles: &[Candle], timeframe: Timeframe) -> Option<Self> {
        let first = candles.first()?.open_time;
        let last = candles.last()?.open_time;
        let span_ms = (last - first).num_milliseconds();
        let expected = (span_ms / timeframe.as_millis()) as usize + 1;

        Some(Self {
            first,
            last,
            count: candles.len(),
            expected: expected.max(candles.len()),
        })
    }

    /// 기대 대비 보유 비율 (0 ~ 1).
    pub fn coverage(&self) -> Decimal {
        if self.expected == 0 {
            return Decimal::ONE;
        }
        Decimal::from(self.count as u64) / Decimal::from(self.expected as u64)
    }

    /// 로그용 커버리지 문자열 (예: "97.92%").
    pub fn coverage_display(&self) -> String {
        self.coverage().round_dp(4).to_percentage_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn candle_at(minute: i64, close: Decimal) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Candle::new(t, dec!(1), dec!(2), dec!(0.5), close, dec!(10))
    }

    #[test]
    fn test_merge_orders_and_dedups() {
        let existing = vec![candle_at(0, dec!(1)), candle_at(2, dec!(1))];
        let incoming = vec![candle_at(3, dec!(1)), candle_at(1, dec!(1)), candle_at(2, dec!(9))];

        let (merged, outcome) = merge_candles(existing, incoming);

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.total, 4);
        assert!(merged.windows(2).all(|w| w[0].open_time < w[1].open_time));
        // 같은 시각이면 새 캔들 우선
        assert_eq!(merged[2].close, dec!(9));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let incoming = vec![candle_at(0, dec!(1)), candle_at(1, dec!(2))];
        let (once, _) = merge_candles(Vec::new(), incoming.clone());
        let (twice, outcome) = merge_candles(once.clone(), incoming);

        assert_eq!(once, twice);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.updated, 0);
        assert!(!outcome.changed());
    }

    #[test]
    fn test_normalize_reports_change() {
        let sorted = vec![candle_at(0, dec!(1)), candle_at(1, dec!(1))];
        let (_, changed) = normalize_series(sorted);
        assert!(!changed);

        let unsorted = vec![candle_at(1, dec!(1)), candle_at(0, dec!(1)), candle_at(1, dec!(5))];
        let (normalized, changed) = normalize_series(unsorted);
        assert!(changed);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[1].close, dec!(5));
    }

    #[test]
    fn test_series_bounds_coverage() {
        let candles: Vec<Candle> = (0..10)
            .filter(|m| *m != 4 && *m != 5)
            .map(|m| candle_at(m, dec!(1)))
            .collect();
        let bounds = SeriesBounds::from_series(&candles, Timeframe::M1).unwrap();

        assert_eq!(bounds.count, 8);
        assert_eq!(bounds.expected, 10);
        assert_eq!(bounds.coverage(), dec!(0.8));
        assert_eq!(bounds.coverage_display(), "80.00%");
        assert!(SeriesBounds::from_series(&[], Timeframe::M1).is_none());
    }
}

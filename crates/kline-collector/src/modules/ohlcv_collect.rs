//! 초기(전체/증분) OHLCV 수집 모듈.

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use kline_core::{Candle, SeriesKey};
use kline_data::{SeriesBounds, SeriesStore};
use kline_exchange::{plan_windows, SegmentedFetcher};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// 초기 수집 결과.
#[derive(Debug, Clone, Default)]
pub struct InitialFetch {
    /// 계획한 윈도우 수
    pub planned_windows: usize,
    /// 처리한 윈도우 수
    pub windows: usize,
    /// 실패한 윈도우 수
    pub failed_windows: usize,
    /// 조회한 캔들 수
    pub candles_fetched: usize,
    /// 저장소에 새로 추가된 캔들 수
    pub inserted: usize,
    /// 모든 윈도우를 처리하기 전에 취소되었는지
    pub cancelled: bool,
}

impl InitialFetch {
    /// 모든 윈도우가 실패했는지 확인.
    pub fn all_failed(&self) -> bool {
        self.windows > 0 && self.failed_windows == self.windows
    }
}

/// 이미 저장된 구간 바깥의 조회 구간을 계산합니다.
///
/// 저장된 시리즈가 없으면 요청 구간 전체, 있으면 첫 캔들 이전과 마지막 캔들
/// 이후만 반환합니다. 내부 누락은 갭 복구가 담당합니다.
pub fn missing_edge_ranges(
    requested_start: DateTime<Utc>,
    requested_end: DateTime<Utc>,
    existing: Option<&SeriesBounds>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let one_ms = Duration::milliseconds(1);

    let Some(bounds) = existing else {
        return vec![(requested_start, requested_end)];
    };

    let mut ranges = Vec::new();

    // 1. 과거 방향 누락
    if requested_start < bounds.first {
        ranges.push((requested_start, (bounds.first - one_ms).min(requested_end)));
    }

    // 2. 최신 방향 누락
    if requested_end > bounds.last {
        ranges.push(((bounds.last + one_ms).max(requested_start), requested_end));
    }

    ranges.retain(|(s, e)| e > s);
    ranges
}

/// 요청 구간을 분할 조회하며 `flush_every` 윈도우마다 저장소에 병합합니다.
///
/// 취소되거나 중간에 저장이 실패해도 이미 병합된 캔들은 유지됩니다.
#[allow(clippy::too_many_arguments)]
pub async fn collect_initial(
    fetcher: &SegmentedFetcher,
    store: &dyn SeriesStore,
    key: &SeriesKey,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    incremental: bool,
    flush_every: usize,
    cancel: &CancellationToken,
) -> Result<InitialFetch> {
    let ranges = if incremental {
        let existing = store.read(key).await?;
        let bounds = SeriesBounds::from_series(&existing, key.timeframe);
        let ranges = missing_edge_ranges(start, end, bounds.as_ref());
        tracing::info!(
            series = %key,
            existing = existing.len(),
            ranges = ranges.len(),
            "증분 수집 구간 계산"
        );
        ranges
    } else {
        vec![(start, end)]
    };

    let page_limit = fetcher.config().page_limit;
    let windows: Vec<_> = ranges
        .iter()
        .flat_map(|(s, e)| plan_windows(&key.symbol, key.timeframe, *s, *e, page_limit))
        .collect();

    let mut summary = InitialFetch {
        planned_windows: windows.len(),
        ..Default::default()
    };

    if windows.is_empty() {
        tracing::debug!(series = %key, "조회할 구간 없음");
        return Ok(summary);
    }

    tracing::info!(series = %key, windows = windows.len(), "초기 수집 시작");

    let flush_every = flush_every.max(1);
    let mut pending: Vec<Candle> = Vec::new();
    let mut unflushed_windows = 0usize;
    let mut batches = Box::pin(fetcher.stream_windows(windows, cancel.clone()));

    while let Some(batch) = batches.next().await {
        summary.windows += 1;
        unflushed_windows += 1;
        if batch.is_failed() {
            summary.failed_windows += 1;
        }
        summary.candles_fetched += batch.candles.len();
        pending.extend(batch.candles);

        if unflushed_windows >= flush_every {
            summary.inserted += flush(store, key, &mut pending).await?;
            unflushed_windows = 0;
        }

        tracing::debug!(
            series = %key,
            progress = format!("{}/{}", summary.windows, summary.planned_windows),
            "윈도우 처리"
        );
    }

    summary.inserted += flush(store, key, &mut pending).await?;
    summary.cancelled = summary.windows < summary.planned_windows;

    tracing::info!(
        series = %key,
        windows = summary.windows,
        failed_windows = summary.failed_windows,
        candles = summary.candles_fetched,
        inserted = summary.inserted,
        cancelled = summary.cancelled,
        "초기 수집 완료"
    );

    Ok(summary)
}

async fn flush(store: &dyn SeriesStore, key: &SeriesKey, pending: &mut Vec<Candle>) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }
    let outcome = store.merge(key, std::mem::take(pending)).await?;
    Ok(outcome.inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn bounds(first: DateTime<Utc>, last: DateTime<Utc>) -> SeriesBounds {
        SeriesBounds {
            first,
            last,
            count: 1,
            expected: 1,
        }
    }

    #[test]
    fn test_no_existing_series_fetches_everything() {
        assert_eq!(
            missing_edge_ranges(utc(1, 0), utc(3, 0), None),
            vec![(utc(1, 0), utc(3, 0))]
        );
    }

    #[test]
    fn test_edges_before_and_after_existing() {
        let existing = bounds(utc(2, 0), utc(2, 12));
        let ranges = missing_edge_ranges(utc(1, 0), utc(3, 0), Some(&existing));

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], (utc(1, 0), utc(2, 0) - Duration::milliseconds(1)));
        assert_eq!(ranges[1], (utc(2, 12) + Duration::milliseconds(1), utc(3, 0)));
    }

    #[test]
    fn test_fully_covered_range_needs_nothing() {
        let existing = bounds(utc(1, 0), utc(3, 0));
        assert!(missing_edge_ranges(utc(1, 0), utc(3, 0), Some(&existing)).is_empty());
    }
}

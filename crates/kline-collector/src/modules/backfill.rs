//! 갭 복구 (BackfillCoordinator).
//!
//! 탐지된 갭마다 `[gap.start, gap.end]` 구간을 다시 조회해 병합합니다.
//! 한 종목 안에서는 순차 실행하며 갭 사이에 고정 딜레이를 둡니다.

use std::sync::Arc;
use std::time::Duration;

use kline_core::{Gap, SeriesKey};
use kline_data::SeriesStore;
use kline_exchange::SegmentedFetcher;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// 갭 하나의 복구 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapRepair {
    /// 대상 갭
    pub gap: Gap,
    /// 새 캔들이 1개 이상 병합되었는지
    pub filled: bool,
    /// 새로 추가된 캔들 수
    pub inserted: usize,
}

impl GapRepair {
    /// 시도하지 않은(또는 실패한) 갭.
    pub fn unfilled(gap: Gap) -> Self {
        Self {
            gap,
            filled: false,
            inserted: 0,
        }
    }
}

/// 복구된 갭 수.
pub fn filled_count(repairs: &[GapRepair]) -> usize {
    repairs.iter().filter(|r| r.filled).count()
}

/// 갭 복구 조정자.
#[derive(Clone)]
pub struct BackfillCoordinator {
    fetcher: SegmentedFetcher,
    store: Arc<dyn SeriesStore>,
    repair_delay: Duration,
}

impl BackfillCoordinator {
    pub fn new(fetcher: SegmentedFetcher, store: Arc<dyn SeriesStore>, repair_delay: Duration) -> Self {
        Self {
            fetcher,
            store,
            repair_delay,
        }
    }

    /// 갭 목록을 순서대로 복구합니다.
    ///
    /// 반환 목록은 입력과 같은 순서이며, 취소로 시도하지 못한 갭은 `filled = false`입니다.
    ///
    /// # Errors
    /// 병합(저장)이 실패하면 즉시 에러를 반환합니다. 이미 병합된 갭은 유지됩니다.
    pub async fn repair(
        &self,
        key: &SeriesKey,
        gaps: &[Gap],
        cancel: &CancellationToken,
    ) -> Result<Vec<GapRepair>> {
        let mut repairs: Vec<GapRepair> = gaps.iter().copied().map(GapRepair::unfilled).collect();

        for (idx, gap) in gaps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(series = %key, remaining = gaps.len() - idx, "갭 복구 취소됨");
                break;
            }

            if idx > 0 && !self.repair_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::warn!(series = %key, remaining = gaps.len() - idx, "갭 복구 취소됨");
                        break;
                    }
                    _ = tokio::time::sleep(self.repair_delay) => {}
                }
            }

            let outcome = self
                .fetcher
                .fetch(&key.symbol, key.timeframe, gap.start, gap.end, cancel.clone())
                .await;

            if outcome.candles.is_empty() {
                let (first_missing, last_missing) = gap.missing_range(key.timeframe);
                tracing::warn!(
                    series = %key,
                    first_missing = %first_missing,
                    last_missing = %last_missing,
                    failed_windows = outcome.failed_windows,
                    "갭 재조회 결과 없음"
                );
                continue;
            }

            let merged = self.store.merge(key, outcome.candles).await?;
            let repair = &mut repairs[idx];
            repair.inserted = merged.inserted;
            repair.filled = merged.inserted > 0;

            tracing::info!(
                series = %key,
                gap_start = %gap.start,
                gap_end = %gap.end,
                missing_units = gap.missing_units,
                inserted = merged.inserted,
                filled = repair.filled,
                "갭 복구"
            );
        }

        Ok(repairs)
    }
}

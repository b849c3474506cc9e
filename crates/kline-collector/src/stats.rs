//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::modules::pipeline::{InstrumentResult, InstrumentStatus};

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 종목 수
    pub total: usize,
    /// 성공 종목 수
    pub success: usize,
    /// 실패 종목 수
    pub failed: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 취소된 종목 수
    pub cancelled: usize,
    /// 조회한 총 캔들 수
    pub candles_fetched: usize,
    /// 실패한 윈도우 수
    pub failed_windows: usize,
    /// 탐지된 갭 수
    pub gaps_detected: usize,
    /// 복구된 갭 수
    pub gaps_filled: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 종목 결과 하나를 반영합니다.
    pub fn record(&mut self, result: &InstrumentResult) {
        self.total += 1;
        match &result.status {
            InstrumentStatus::Success => self.success += 1,
            InstrumentStatus::Empty => self.empty += 1,
            InstrumentStatus::Cancelled => self.cancelled += 1,
            InstrumentStatus::Failed(_) => self.failed += 1,
        }
        self.candles_fetched += result.candles_fetched;
        self.failed_windows += result.failed_windows;
        self.gaps_detected += result.gaps.len();
        self.gaps_filled += result.filled_count();
    }

    /// 작업 중 패닉 등으로 결과가 없는 종목을 실패로 셉니다.
    pub fn record_lost(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            failed = self.failed,
            empty = self.empty,
            cancelled = self.cancelled,
            candles_fetched = self.candles_fetched,
            failed_windows = self.failed_windows,
            gaps_detected = self.gaps_detected,
            gaps_filled = self.gaps_filled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

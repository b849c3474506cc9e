//! 시리즈 누락 구간 탐지.
//!
//! 인접한 두 캔들의 간격이 `interval * tolerance`를 넘으면 그 사이를 갭으로 봅니다.
//! 기본 tolerance는 1.5입니다.
//!
//! ```rust,ignore
//! let detector = GapDetector::default();
//! let gaps = detector.detect(&series, Timeframe::M1);
//! ```

use kline_core::{Candle, Gap, Timeframe};
use tracing::debug;

/// 기본 갭 판정 배수.
pub const DEFAULT_GAP_TOLERANCE: f64 = 1.5;

/// 갭 탐지기. 상태가 없는 순수 함수입니다.
#[derive(Debug, Clone, Copy)]
pub struct GapDetector {
    tolerance: f64,
}

impl Default for GapDetector {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_GAP_TOLERANCE,
        }
    }
}

impl GapDetector {
    /// 지정한 배수로 생성합니다. 1 이하는 기본값으로 대체됩니다.
    pub fn new(tolerance: f64) -> Self {
        if tolerance.is_nan() || tolerance <= 1.0 {
            return Self::default();
        }
        Self { tolerance }
    }

    /// 갭 판정 배수.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 오름차순 시리즈의 갭 목록을 반환합니다. 캔들이 2개 미만이면 빈 목록.
    pub fn detect(&self, series: &[Candle], timeframe: Timeframe) -> Vec<Gap> {
        let threshold_ms = timeframe.as_millis() as f64 * self.tolerance;

        let gaps: Vec<Gap> = series
            .windows(2)
            .filter(|pair| {
                let delta_ms = (pair[1].open_time - pair[0].open_time).num_milliseconds();
                delta_ms as f64 > threshold_ms
            })
            .filter_map(|pair| Gap::between(pair[0].open_time, pair[1].open_time, timeframe))
            .collect();

        if !gaps.is_empty() {
            let missing: i64 = gaps.iter().map(|g| g.missing_units).sum();
            debug!(
                interval = %timeframe,
                gaps = gaps.len(),
                missing_units = missing,
                "갭 탐지"
            );
        }

        gaps
    }
}

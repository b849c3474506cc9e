//! 종목별 파이프라인과 동시 실행 드라이버.
//!
//! 한 종목의 처리 순서는 항상 같습니다:
//!
//! 1. 초기 수집 (분할 조회 → 저장소 병합)
//! 2. 저장된 시리즈 재검사 (갭 탐지)
//! 3. 갭 복구
//! 4. 리포트용 결과 생성
//!
//! 종목 사이에는 `Semaphore`로 제한된 워커 풀이 병렬로 실행하고,
//! 종목 안에서는 순차 실행합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kline_core::{instrument_span, Gap, SeriesKey, Timeframe};
use kline_data::{GapDetector, SeriesBounds, SeriesStore};
use kline_exchange::SegmentedFetcher;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::modules::backfill::{filled_count, BackfillCoordinator, GapRepair};
use crate::modules::ohlcv_collect::collect_initial;
use crate::{CollectionStats, CollectorConfig, Result};

/// 실행할 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunMode {
    /// 수집 → 검사 → 복구
    Full,
    /// 수집 → 검사 (복구 없음)
    CollectOnly,
    /// 검사 → 복구 (초기 수집 없음)
    RepairOnly,
    /// 검사만 (네트워크 없음)
    CheckOnly,
}

impl RunMode {
    fn fetches(self) -> bool {
        matches!(self, RunMode::Full | RunMode::CollectOnly)
    }

    fn repairs(self) -> bool {
        matches!(self, RunMode::Full | RunMode::RepairOnly)
    }
}

/// 파이프라인 실행 옵션.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub incremental: bool,
    pub flush_every: usize,
    pub mode: RunMode,
}

impl PipelineOptions {
    /// 실행 설정에서 옵션을 만듭니다.
    pub fn from_config(config: &CollectorConfig, mode: RunMode) -> Self {
        Self {
            timeframe: config.timeframe,
            start: config.start,
            end: config.end,
            incremental: config.incremental,
            flush_every: config.flush_every,
            mode,
        }
    }
}

/// 종목 처리 결과 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstrumentStatus {
    /// 정상 완료
    Success,
    /// 데이터 없음
    Empty,
    /// 중간에 취소됨 (병합된 데이터는 유지)
    Cancelled,
    /// 실패 (원인)
    Failed(String),
}

/// 한 종목의 파이프라인 결과.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentResult {
    /// 시리즈 식별자
    pub key: SeriesKey,
    /// 결과 상태
    pub status: InstrumentStatus,
    /// 초기 수집에서 받은 캔들 수
    pub candles_fetched: usize,
    /// 초기 수집에서 실패한 윈도우 수
    pub failed_windows: usize,
    /// 탐지된 갭과 복구 여부
    pub gaps: Vec<GapRepair>,
    /// 복구 후에도 남은 갭 수
    pub remaining_gaps: usize,
    /// 최종 시리즈 범위
    #[serde(skip)]
    pub bounds: Option<SeriesBounds>,
}

impl InstrumentResult {
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            status: InstrumentStatus::Success,
            candles_fetched: 0,
            failed_windows: 0,
            gaps: Vec::new(),
            remaining_gaps: 0,
            bounds: None,
        }
    }

    /// 복구된 갭 수.
    pub fn filled_count(&self) -> usize {
        filled_count(&self.gaps)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InstrumentStatus::Failed(_))
    }
}

/// 종목 하나를 처리하는 파이프라인.
pub struct InstrumentPipeline {
    fetcher: SegmentedFetcher,
    store: Arc<dyn SeriesStore>,
    detector: GapDetector,
    backfill: BackfillCoordinator,
    options: PipelineOptions,
}

impl InstrumentPipeline {
    pub fn new(
        fetcher: SegmentedFetcher,
        store: Arc<dyn SeriesStore>,
        detector: GapDetector,
        repair_delay: Duration,
        options: PipelineOptions,
    ) -> Self {
        let backfill = BackfillCoordinator::new(fetcher.clone(), Arc::clone(&store), repair_delay);
        Self {
            fetcher,
            store,
            detector,
            backfill,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// 한 종목을 처리합니다. 에러는 결과 상태(`Failed`)로 돌려줍니다.
    pub async fn run(&self, symbol: &str, cancel: CancellationToken) -> InstrumentResult {
        let key = SeriesKey::new(symbol, self.options.timeframe);
        let span = instrument_span!("instrument", key.symbol, key.timeframe);

        async {
            let mut result = InstrumentResult::new(key.clone());
            if let Err(e) = self.run_stages(&key, &cancel, &mut result).await {
                tracing::error!(error = %e, "종목 처리 실패");
                result.status = InstrumentStatus::Failed(e.to_string());
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        key: &SeriesKey,
        cancel: &CancellationToken,
        result: &mut InstrumentResult,
    ) -> Result<()> {
        let opts = &self.options;

        // 1. 초기 수집
        if opts.mode.fetches() {
            let initial = collect_initial(
                &self.fetcher,
                self.store.as_ref(),
                key,
                opts.start,
                opts.end,
                opts.incremental,
                opts.flush_every,
                cancel,
            )
            .await?;

            result.candles_fetched = initial.candles_fetched;
            result.failed_windows = initial.failed_windows;

            if initial.all_failed() {
                result.status = InstrumentStatus::Failed(format!(
                    "all {} windows failed",
                    initial.windows
                ));
                tracing::warn!(windows = initial.windows, "모든 윈도우 실패, 종목 건너뜀");
                return Ok(());
            }
            if initial.cancelled {
                result.status = InstrumentStatus::Cancelled;
                return Ok(());
            }
        }

        // 2. 재검사
        let series = self.store.read(key).await?;
        if series.is_empty() {
            tracing::info!("저장된 캔들 없음");
            result.status = InstrumentStatus::Empty;
            return Ok(());
        }
        let gaps = self.detector.detect(&series, key.timeframe);
        result.bounds = SeriesBounds::from_series(&series, key.timeframe);
        log_integrity("검사", series.len(), &gaps, result.bounds.as_ref());

        // 3. 복구
        if !opts.mode.repairs() || gaps.is_empty() {
            result.remaining_gaps = gaps.len();
            result.gaps = gaps.into_iter().map(GapRepair::unfilled).collect();
            return Ok(());
        }

        result.gaps = self.backfill.repair(key, &gaps, cancel).await?;

        let series = self.store.read(key).await?;
        let remaining = self.detector.detect(&series, key.timeframe);
        result.remaining_gaps = remaining.len();
        result.bounds = SeriesBounds::from_series(&series, key.timeframe);
        log_integrity("복구 후 검사", series.len(), &remaining, result.bounds.as_ref());

        if cancel.is_cancelled() {
            result.status = InstrumentStatus::Cancelled;
        }
        Ok(())
    }
}

fn log_integrity(stage: &str, count: usize, gaps: &[Gap], bounds: Option<&SeriesBounds>) {
    let missing: i64 = gaps.iter().map(|g| g.missing_units).sum();
    tracing::info!(
        stage,
        candles = count,
        gaps = gaps.len(),
        missing_units = missing,
        first = ?bounds.map(|b| b.first),
        last = ?bounds.map(|b| b.last),
        coverage = bounds.map(|b| b.coverage_display()).unwrap_or_default(),
        "시리즈 무결성"
    );
}

/// 전체 종목 실행 결과.
#[derive(Debug, Clone, Default)]
pub struct FleetOutcome {
    /// 종목별 결과 (심볼 순)
    pub results: Vec<InstrumentResult>,
    /// 집계 통계
    pub stats: CollectionStats,
}

/// 종목들을 최대 `concurrency`개씩 병렬로 처리합니다.
///
/// 한 종목의 실패는 다른 종목에 영향을 주지 않습니다.
pub async fn run_fleet(
    pipeline: Arc<InstrumentPipeline>,
    symbols: Vec<String>,
    concurrency: usize,
    cancel: CancellationToken,
) -> FleetOutcome {
    let started = Instant::now();
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    tracing::info!(
        instruments = symbols.len(),
        concurrency,
        mode = ?pipeline.options().mode,
        "파이프라인 시작"
    );

    for symbol in symbols {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            // 워커 수 제한 (permit 획득까지 대기)
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let mut result = InstrumentResult::new(SeriesKey::new(
                        &symbol,
                        pipeline.options().timeframe,
                    ));
                    result.status = InstrumentStatus::Failed("worker pool closed".to_string());
                    return result;
                }
            };

            if cancel.is_cancelled() {
                let mut result =
                    InstrumentResult::new(SeriesKey::new(&symbol, pipeline.options().timeframe));
                result.status = InstrumentStatus::Cancelled;
                return result;
            }

            pipeline.run(&symbol, cancel).await
        });
    }

    let mut outcome = FleetOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                outcome.stats.record(&result);
                outcome.results.push(result);
            }
            Err(e) => {
                tracing::error!(error = %e, "종목 작업 비정상 종료");
                outcome.stats.record_lost();
            }
        }
    }

    outcome.results.sort_by(|a, b| a.key.cmp(&b.key));
    outcome.stats.elapsed = started.elapsed();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use kline_core::{Candle, FetchWindow};
    use kline_data::MemorySeriesStore;
    use kline_exchange::{ExchangeError, ExchangeResult, FetcherConfig, KlineSource};
    use rust_decimal_macros::dec;

    /// 심볼 이름이 "BAD"로 시작하면 항상 실패하는 시간 단위 가짜 소스.
    struct HourlySource;

    #[async_trait]
    impl KlineSource for HourlySource {
        fn name(&self) -> &str {
            "hourly"
        }

        async fn fetch_window(
            &self,
            window: &FetchWindow,
            _limit: u32,
            _cancel: &CancellationToken,
        ) -> ExchangeResult<Vec<Candle>> {
            if window.symbol.starts_with("BAD") {
                return Err(ExchangeError::HttpStatus {
                    status: 400,
                    body: "Invalid symbol.".into(),
                });
            }
            let step = chrono::Duration::hours(1);
            let mut t = window.start;
            let mut out = Vec::new();
            while t <= window.end {
                out.push(Candle::new(t, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(10)));
                t += step;
            }
            Ok(out)
        }
    }

    fn pipeline(store: Arc<MemorySeriesStore>, mode: RunMode) -> Arc<InstrumentPipeline> {
        let fetcher = SegmentedFetcher::new(
            Arc::new(HourlySource),
            FetcherConfig::default().with_request_delay(Duration::ZERO),
        );
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let options = PipelineOptions {
            timeframe: Timeframe::H1,
            start,
            end: start + chrono::Duration::days(2) - chrono::Duration::milliseconds(1),
            incremental: false,
            flush_every: 10,
            mode,
        };
        Arc::new(InstrumentPipeline::new(
            fetcher,
            store,
            GapDetector::default(),
            Duration::ZERO,
            options,
        ))
    }

    #[tokio::test]
    async fn test_fleet_isolates_failing_instrument() {
        let store = Arc::new(MemorySeriesStore::new());
        let outcome = run_fleet(
            pipeline(store.clone(), RunMode::Full),
            vec!["BTCUSDT".into(), "BADCOIN".into(), "ETHUSDT".into()],
            2,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.success, 2);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.results[0].key.symbol, "BADCOIN");
        assert!(outcome.results[0].is_failed());
        assert_eq!(outcome.results[1].candles_fetched, 48);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_check_only_on_empty_store_reports_empty() {
        let store = Arc::new(MemorySeriesStore::new());
        let result = pipeline(store, RunMode::CheckOnly)
            .run("BTCUSDT", CancellationToken::new())
            .await;

        assert_eq!(result.status, InstrumentStatus::Empty);
        assert_eq!(result.candles_fetched, 0);
    }

    #[tokio::test]
    async fn test_cancelled_fleet_does_no_work() {
        let store = Arc::new(MemorySeriesStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_fleet(
            pipeline(store.clone(), RunMode::Full),
            vec!["BTCUSDT".into()],
            1,
            cancel,
        )
        .await;

        assert_eq!(outcome.stats.cancelled, 1);
        assert!(store.is_empty().await);
    }
}

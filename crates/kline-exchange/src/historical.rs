//! 페이지 한도 단위 분할 조회 (SegmentedFetcher).
//!
//! `[start, end]` 구간을 `(limit - 1) * 간격` 폭의 연속 윈도우로 나누고
//! 윈도우마다 한 번씩 [`KlineSource`]를 호출합니다. 실패한 윈도우는 기록만 하고
//! 다음 윈도우로 넘어갑니다.
//!
//! ```rust,ignore
//! let fetcher = SegmentedFetcher::new(source, FetcherConfig::default());
//! let outcome = fetcher
//!     .fetch("BTCUSDT", Timeframe::H1, start, end, CancellationToken::new())
//!     .await;
//! println!("{} candles, {} failed windows", outcome.candles.len(), outcome.failed_windows);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, Stream, StreamExt};
use kline_core::{Candle, FetchSettings, FetchWindow, Timeframe, MAX_PAGE_LIMIT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::traits::KlineSource;
use crate::ExchangeError;

/// 분할 조회 설정.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// 요청당 최대 캔들 수
    pub page_limit: u32,
    /// 윈도우 사이 딜레이
    pub request_delay: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_limit: MAX_PAGE_LIMIT,
            request_delay: Duration::from_millis(200),
        }
    }
}

impl FetcherConfig {
    /// 설정 파일의 `[fetch]` 섹션에서 생성합니다.
    ///
    /// `page_limit`은 `1..=MAX_PAGE_LIMIT`로 제한됩니다.
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            page_limit: settings.page_limit.clamp(1, MAX_PAGE_LIMIT),
            request_delay: Duration::from_millis(settings.request_delay_ms),
        }
    }

    /// 윈도우 사이 딜레이 변경.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }
}

/// `[start, end]`를 조회 윈도우 목록으로 분할합니다.
///
/// 각 윈도우는 최대 `page_limit`개의 캔들을 담으며, 다음 윈도우는 이전 윈도우
/// 끝 + 1ms에서 시작합니다. `end <= start`이면 빈 목록입니다.
pub fn plan_windows(
    symbol: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page_limit: u32,
) -> Vec<FetchWindow> {
    let mut windows = Vec::new();
    if end <= start {
        return windows;
    }

    let span = timeframe.window_span(page_limit.max(1));
    let one_ms = ChronoDuration::milliseconds(1);
    let mut cursor = start;

    while cursor <= end {
        let window_end = (cursor + span).min(end);
        windows.push(FetchWindow {
            symbol: symbol.to_string(),
            timeframe,
            start: cursor,
            end: window_end,
        });

        // page_limit = 1이면 폭이 0이므로 간격 단위로 전진
        cursor = if span.is_zero() {
            cursor + timeframe.to_chrono()
        } else {
            window_end + one_ms
        };
    }

    windows
}

/// 한 윈도우의 조회 결과.
#[derive(Debug)]
pub struct WindowBatch {
    /// 조회한 윈도우
    pub window: FetchWindow,
    /// 윈도우 안의 캔들 (오름차순, 중복 없음)
    pub candles: Vec<Candle>,
    /// 실패했으면 그 원인
    pub error: Option<ExchangeError>,
}

impl WindowBatch {
    /// 실패한 윈도우인지 확인.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// 전체 구간 조회 결과.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// 모든 성공 윈도우의 캔들 (오름차순, 중복 없음)
    pub candles: Vec<Candle>,
    /// 조회한 윈도우 수
    pub windows: usize,
    /// 실패한 윈도우 수
    pub failed_windows: usize,
    /// 모든 윈도우를 처리하기 전에 취소되었는지
    pub cancelled: bool,
}

impl FetchOutcome {
    /// 모든 윈도우가 실패했는지 확인.
    pub fn all_failed(&self) -> bool {
        self.windows > 0 && self.failed_windows == self.windows
    }
}

/// 윈도우 분할 조회기.
#[derive(Clone)]
pub struct SegmentedFetcher {
    source: Arc<dyn KlineSource>,
    config: FetcherConfig,
}

impl SegmentedFetcher {
    /// 새 조회기 생성.
    pub fn new(source: Arc<dyn KlineSource>, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    /// 조회기 설정.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// 구간을 분할해 윈도우별 결과를 순서대로 내보내는 스트림.
    ///
    /// 취소되면 진행 중인 윈도우는 버리고 종료합니다.
    pub fn stream(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = WindowBatch> + Send + 'static {
        let windows = plan_windows(symbol, timeframe, start, end, self.config.page_limit);
        self.stream_windows(windows, cancel)
    }

    /// 미리 계획한 윈도우 목록을 순서대로 조회합니다.
    pub fn stream_windows(
        &self,
        windows: Vec<FetchWindow>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = WindowBatch> + Send + 'static {
        let state = StreamState {
            source: Arc::clone(&self.source),
            pending: VecDeque::from(windows),
            limit: self.config.page_limit,
            delay: self.config.request_delay,
            cancel,
            started: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.cancel.is_cancelled() {
                return None;
            }
            let window = state.pending.pop_front()?;

            // 첫 윈도우를 제외하고 요청 간격 유지
            if state.started && !state.delay.is_zero() {
                tokio::select! {
                    _ = state.cancel.cancelled() => return None,
                    _ = tokio::time::sleep(state.delay) => {}
                }
            }
            state.started = true;

            let batch = fetch_one(state.source.as_ref(), window, state.limit, &state.cancel).await?;
            Some((batch, state))
        })
    }

    /// 구간 전체를 조회해 하나의 결과로 모읍니다.
    pub async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> FetchOutcome {
        let windows = plan_windows(symbol, timeframe, start, end, self.config.page_limit);
        let planned = windows.len();

        debug!(
            source = self.source.name(),
            symbol,
            interval = %timeframe,
            windows = planned,
            "분할 조회 시작"
        );

        let mut outcome = FetchOutcome::default();
        let mut batches = Box::pin(self.stream_windows(windows, cancel));

        while let Some(batch) = batches.next().await {
            outcome.windows += 1;
            if batch.is_failed() {
                outcome.failed_windows += 1;
            }
            outcome.candles.extend(batch.candles);
        }

        outcome.cancelled = outcome.windows < planned;
        normalize_candles(&mut outcome.candles);

        if outcome.cancelled {
            warn!(
                symbol,
                completed = outcome.windows,
                planned,
                "분할 조회 취소됨"
            );
        } else {
            info!(
                symbol,
                interval = %timeframe,
                candles = outcome.candles.len(),
                windows = outcome.windows,
                failed_windows = outcome.failed_windows,
                "분할 조회 완료"
            );
        }

        outcome
    }
}

struct StreamState {
    source: Arc<dyn KlineSource>,
    pending: VecDeque<FetchWindow>,
    limit: u32,
    delay: Duration,
    cancel: CancellationToken,
    started: bool,
}

/// 윈도우 하나를 조회합니다. 취소되었으면 `None` (해당 윈도우는 내보내지 않음).
async fn fetch_one(
    source: &dyn KlineSource,
    window: FetchWindow,
    limit: u32,
    cancel: &CancellationToken,
) -> Option<WindowBatch> {
    let batch = match source.fetch_window(&window, limit, cancel).await {
        Err(ExchangeError::Cancelled) => {
            debug!(window = %window, "윈도우 조회 중 취소됨");
            return None;
        }
        Ok(mut candles) => {
            let received = candles.len();
            candles.retain(|c| window.contains(c.open_time));
            normalize_candles(&mut candles);

            if candles.len() < received {
                debug!(window = %window, received, kept = candles.len(), "윈도우 밖 캔들 제외");
            }

            WindowBatch {
                window,
                candles,
                error: None,
            }
        }
        Err(err) => {
            if err.is_malformed() {
                warn!(window = %window, error = %err, "응답 형식 오류, 빈 윈도우로 처리");
            } else {
                warn!(window = %window, error = %err, "윈도우 조회 실패, 다음 윈도우로 진행");
            }
            WindowBatch {
                window,
                candles: Vec::new(),
                error: Some(err),
            }
        }
    };
    Some(batch)
}

/// `open_time` 오름차순 정렬 후 중복 제거 (같은 시각이면 뒤의 값 유지).
fn normalize_candles(candles: &mut Vec<Candle>) {
    let sorted = candles.windows(2).all(|w| w[0].open_time < w[1].open_time);
    if sorted {
        return;
    }

    // 안정 정렬이므로 같은 시각의 캔들은 입력 순서 유지
    candles.sort_by_key(|c| c.open_time);
    let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.open_time == candle.open_time => *last = candle,
            _ => deduped.push(candle),
        }
    }
    *candles = deduped;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    use crate::ExchangeResult;

    /// 윈도우 안의 간격 정렬 시각마다 캔들을 만들어 주는 가짜 소스.
    struct SyntheticSource {
        requested: Mutex<Vec<FetchWindow>>,
        fail_containing: Option<DateTime<Utc>>,
        /// 이 번째(0부터) 요청 도중 취소 신호가 온 것처럼 동작
        cancel_at_call: Option<usize>,
    }

    impl SyntheticSource {
        fn new() -> Self {
            Self {
                requested: Mutex::new(Vec::new()),
                fail_containing: None,
                cancel_at_call: None,
            }
        }
    }

    #[async_trait]
    impl KlineSource for SyntheticSource {
        fn name(&self) -> &str {
            "synthetic"
        }

        async fn fetch_window(
            &self,
            window: &FetchWindow,
            limit: u32,
            cancel: &CancellationToken,
        ) -> ExchangeResult<Vec<Candle>> {
            let call = {
                let mut requested = self.requested.lock().unwrap();
                requested.push(window.clone());
                requested.len() - 1
            };
            if self.cancel_at_call == Some(call) {
                cancel.cancel();
                return Err(ExchangeError::Cancelled);
            }
            if let Some(t) = self.fail_containing {
                if window.contains(t) {
                    return Err(ExchangeError::HttpStatus {
                        status: 400,
                        body: "rejected".into(),
                    });
                }
            }

            let step = window.timeframe.as_millis();
            let first = (window.start.timestamp_millis() + step - 1) / step * step;
            let mut candles = Vec::new();
            let mut t = first;
            while t <= window.end.timestamp_millis() && candles.len() < limit as usize {
                let open_time = DateTime::from_timestamp_millis(t).unwrap();
                candles.push(Candle::new(open_time, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(10)));
                t += step;
            }
            Ok(candles)
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn no_delay() -> FetcherConfig {
        FetcherConfig::default().with_request_delay(Duration::ZERO)
    }

    #[test]
    fn test_plan_windows_minute_span_bounded_by_page_limit() {
        let start = utc(2024, 1, 1, 0, 0);
        let end = utc(2024, 1, 3, 0, 0);
        let windows = plan_windows("BTCUSDT", Timeframe::M1, start, end, 1000);

        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for w in &windows {
            assert!(w.span() <= ChronoDuration::minutes(999));
            assert!(w.max_candles() <= 1000);
        }
        // 2880분 + 1 → 1000, 1000, 881
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn test_from_settings_clamps_page_limit() {
        let settings = FetchSettings {
            page_limit: 5000,
            request_delay_ms: 0,
        };
        assert_eq!(FetcherConfig::from_settings(&settings).page_limit, MAX_PAGE_LIMIT);

        let settings = FetchSettings {
            page_limit: 0,
            request_delay_ms: 0,
        };
        assert_eq!(FetcherConfig::from_settings(&settings).page_limit, 1);
    }

    #[test]
    fn test_plan_windows_daily_span() {
        let start = utc(2017, 1, 1, 0, 0);
        let end = utc(2024, 1, 1, 0, 0);
        let windows = plan_windows("BTCUSDT", Timeframe::D1, start, end, 1000);

        for w in &windows {
            assert!(w.span() <= ChronoDuration::days(999));
        }
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn test_plan_windows_contiguous_without_overlap() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 17, 23).unwrap();
        let end = utc(2024, 1, 20, 0, 0);
        let windows = plan_windows("ETHUSDT", Timeframe::M5, start, end, 100);

        for pair in windows.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + ChronoDuration::milliseconds(1));
        }
    }

    #[test]
    fn test_plan_windows_empty_when_end_not_after_start() {
        let t = utc(2024, 1, 1, 0, 0);
        assert!(plan_windows("BTCUSDT", Timeframe::H1, t, t, 1000).is_empty());
        assert!(plan_windows("BTCUSDT", Timeframe::H1, t, t - ChronoDuration::hours(1), 1000).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_collects_all_windows_in_order() {
        let source = Arc::new(SyntheticSource::new());
        let fetcher = SegmentedFetcher::new(source.clone(), no_delay());

        let start = utc(2024, 1, 1, 0, 0);
        let end = utc(2024, 1, 3, 0, 0);
        let outcome = fetcher
            .fetch("BTCUSDT", Timeframe::M1, start, end, CancellationToken::new())
            .await;

        assert_eq!(outcome.windows, 3);
        assert_eq!(outcome.failed_windows, 0);
        assert!(!outcome.cancelled);
        assert_eq!(outcome.candles.len(), 2881);
        assert!(outcome
            .candles
            .windows(2)
            .all(|w| w[0].open_time < w[1].open_time));
    }

    #[tokio::test]
    async fn test_failed_window_is_skipped() {
        let mut source = SyntheticSource::new();
        source.fail_containing = Some(utc(2024, 1, 2, 0, 0));
        let source = Arc::new(source);
        let fetcher = SegmentedFetcher::new(source.clone(), no_delay());

        let outcome = fetcher
            .fetch(
                "BTCUSDT",
                Timeframe::M1,
                utc(2024, 1, 1, 0, 0),
                utc(2024, 1, 3, 0, 0),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.windows, 3);
        assert_eq!(outcome.failed_windows, 1);
        assert!(!outcome.all_failed());
        // 두 번째 윈도우(1000분 ~ 1998분)의 999개가 빠짐
        assert_eq!(outcome.candles.len(), 2881 - 999);
        assert_eq!(source.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let source = Arc::new(SyntheticSource::new());
        let fetcher = SegmentedFetcher::new(source.clone(), no_delay());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fetcher
            .fetch("BTCUSDT", Timeframe::H1, utc(2024, 1, 1, 0, 0), utc(2024, 3, 1, 0, 0), cancel)
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.windows, 0);
        assert!(source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_window_drops_that_window() {
        let source = Arc::new(SyntheticSource {
            cancel_at_call: Some(1),
            ..SyntheticSource::new()
        });
        let fetcher = SegmentedFetcher::new(source.clone(), no_delay());

        let outcome = fetcher
            .fetch(
                "BTCUSDT",
                Timeframe::M1,
                utc(2024, 1, 1, 0, 0),
                utc(2024, 1, 3, 0, 0),
                CancellationToken::new(),
            )
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.windows, 1);
        assert_eq!(outcome.failed_windows, 0);
        assert_eq!(outcome.candles.len(), 1000);
        // 세 번째 윈도우는 요청하지 않음
        assert_eq!(source.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_yields_batches_in_window_order() {
        let source = Arc::new(SyntheticSource::new());
        let fetcher = SegmentedFetcher::new(
            source,
            FetcherConfig {
                page_limit: 24,
                request_delay: Duration::ZERO,
            },
        );

        let batches: Vec<WindowBatch> = fetcher
            .stream(
                "BTCUSDT",
                Timeframe::H1,
                utc(2024, 1, 1, 0, 0),
                utc(2024, 1, 3, 23, 0),
                CancellationToken::new(),
            )
            .collect()
            .await;

        // 24, 23, 23, 2 (두 번째 윈도우부터 시작이 1ms 밀려 첫 정각을 건너뜀)
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|b| !b.is_failed() && b.candles.len() <= 24));
        for pair in batches.windows(2) {
            assert!(pair[0].window.end < pair[1].window.start);
        }
        let total: usize = batches.iter().map(|b| b.candles.len()).sum();
        assert_eq!(total, 72);
    }

    #[test]
    fn test_normalize_keeps_last_duplicate() {
        let t0 = utc(2024, 1, 1, 0, 0);
        let t1 = utc(2024, 1, 1, 1, 0);
        let mut candles = vec![
            Candle::new(t1, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)),
            Candle::new(t0, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)),
            Candle::new(t1, dec!(2), dec!(2), dec!(2), dec!(2), dec!(2)),
        ];
        normalize_candles(&mut candles);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].open, dec!(2));
    }
}

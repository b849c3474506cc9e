//! 실행 설정 모듈.
//!
//! 파일/환경변수 설정([`AppConfig`])과 CLI 인자([`RunRequest`])를 합쳐
//! 한 번의 실행에 필요한 [`CollectorConfig`]를 만듭니다.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use kline_core::{AppConfig, Timeframe};
use kline_exchange::{BinanceConfig, FetcherConfig, RetryConfig};

use crate::error::CollectorError;
use crate::Result;

/// 몇 개의 윈도우마다 저장소에 병합할지 (취소/실패 시 손실 범위 제한)
pub const DEFAULT_FLUSH_EVERY: usize = 10;

/// CLI에서 넘어온 실행 요청 (모두 선택 사항).
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// 쉼표로 구분된 심볼 (예: "BTCUSDT,ETHUSDT")
    pub symbols: Option<String>,
    /// 시작 날짜 (YYYY-MM-DD 또는 RFC 3339)
    pub start: Option<String>,
    /// 종료 날짜 (해당 시각 직전까지)
    pub end: Option<String>,
    /// 캔들 간격 (예: "1h")
    pub interval: Option<String>,
    /// 이미 저장된 구간 바깥만 조회
    pub incremental: bool,
}

/// 한 번의 실행 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 대상 심볼
    pub symbols: Vec<String>,
    /// 캔들 간격
    pub timeframe: Timeframe,
    /// 조회 시작 (포함)
    pub start: DateTime<Utc>,
    /// 조회 종료 (포함, 요청 종료 시각 - 1ms)
    pub end: DateTime<Utc>,
    /// 증분 수집 여부
    pub incremental: bool,
    /// 동시에 처리할 종목 수
    pub concurrency: usize,
    /// 병합 주기 (윈도우 수)
    pub flush_every: usize,
    /// 거래소 설정
    pub exchange: BinanceConfig,
    /// 재시도 정책
    pub retry: RetryConfig,
    /// 분할 조회 설정
    pub fetch: FetcherConfig,
    /// 갭 판정 배수
    pub gap_tolerance: f64,
    /// 갭 복구 사이 딜레이
    pub repair_delay: Duration,
    /// 시리즈 디렉토리
    pub data_dir: PathBuf,
    /// 리포트 디렉토리
    pub report_dir: PathBuf,
}

impl CollectorConfig {
    /// 설정 파일 값과 CLI 요청으로 실행 설정을 만듭니다.
    ///
    /// 날짜 미지정 시 종료는 오늘 0시(UTC), 시작은 그 1년 전입니다.
    ///
    /// # Errors
    /// 날짜/간격 형식이 잘못되었거나 종료가 시작보다 늦지 않으면 `CollectorError::Config`.
    pub fn from_app(app: &AppConfig, request: &RunRequest) -> Result<Self> {
        let symbols = match request.symbols.as_deref() {
            Some(raw) => parse_symbols(raw),
            None => app
                .collector
                .default_symbols
                .iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        };
        if symbols.is_empty() {
            return Err(CollectorError::Config("수집할 심볼이 없습니다".to_string()));
        }

        let timeframe = match request.interval.as_deref() {
            Some(raw) => raw.parse::<Timeframe>()?,
            None => app.collector.default_interval,
        };

        let (start, end) = determine_range(request.start.as_deref(), request.end.as_deref())?;

        Ok(Self {
            symbols,
            timeframe,
            start,
            end,
            incremental: request.incremental,
            concurrency: app.collector.concurrency.max(1),
            flush_every: DEFAULT_FLUSH_EVERY,
            exchange: BinanceConfig::from_settings(&app.exchange),
            retry: RetryConfig::from_settings(&app.retry),
            fetch: FetcherConfig::from_settings(&app.fetch),
            gap_tolerance: app.gap.tolerance,
            repair_delay: Duration::from_millis(app.gap.repair_delay_ms),
            data_dir: app.storage.data_dir.clone(),
            report_dir: app.storage.report_dir.clone(),
        })
    }
}

/// 쉼표로 구분된 심볼 목록을 파싱합니다 (대문자, 중복 제거, 입력 순서 유지).
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !s.is_empty() && !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

/// 날짜 문자열을 UTC 시각으로 파싱합니다.
///
/// `YYYY-MM-DD`(자정 UTC)와 RFC 3339를 허용합니다.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            CollectorError::Config(format!(
                "날짜 형식이 잘못되었습니다 (YYYY-MM-DD 또는 RFC 3339): {}",
                raw
            ))
        })
}

/// 요청 구간 `[start, end)`를 조회 구간 `[start, end - 1ms]`로 바꿉니다.
fn determine_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end = match end {
        Some(raw) => parse_date(raw)?,
        None => Utc::now()
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc(),
    };
    let start = match start {
        Some(raw) => parse_date(raw)?,
        None => end - ChronoDuration::days(365),
    };

    if end <= start {
        return Err(CollectorError::Config(format!(
            "종료({})가 시작({})보다 늦어야 합니다",
            end.format("%Y-%m-%d %H:%M"),
            start.format("%Y-%m-%d %H:%M")
        )));
    }

    Ok((start, end - ChronoDuration::milliseconds(1)))
}

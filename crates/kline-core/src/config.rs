//! 설정 관리.
//!
//! 기본값 → TOML 파일(선택) → 환경 변수(`KLINE__섹션__키`) 순서로 덮어씁니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::types::Timeframe;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 요청 한 번에 받을 수 있는 최대 캔들 수.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 거래소 연결 설정
    pub exchange: ExchangeSettings,
    /// HTTP 재시도 설정
    pub retry: RetrySettings,
    /// 윈도우 분할 조회 설정
    pub fetch: FetchSettings,
    /// 갭 탐지/복구 설정
    pub gap: GapSettings,
    /// 저장소 설정
    pub storage: StorageSettings,
    /// 수집기(워커 풀) 설정
    pub collector: CollectorSettings,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 거래소 연결 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            timeout_secs: 30,
        }
    }
}

/// HTTP 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// 최대 시도 횟수 (첫 요청 포함)
    pub max_attempts: u32,
    /// 백오프 기본 단위 (밀리초). n번째 재시도 전 `factor * 2^(n-1)` 대기
    pub backoff_factor_ms: u64,
    /// 재시도 대상 HTTP 상태 코드
    pub retry_statuses: Vec<u16>,
    /// 추가로 재시도할 4xx 상태 코드 (예: 429)
    pub extra_retry_statuses: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor_ms: 1000,
            retry_statuses: vec![500, 502, 503, 504],
            extra_retry_statuses: Vec::new(),
        }
    }
}

/// 윈도우 분할 조회 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// 요청당 최대 캔들 수 (거래소 페이지 한도)
    pub page_limit: u32,
    /// 윈도우 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_limit: MAX_PAGE_LIMIT,
            request_delay_ms: 200,
        }
    }
}

/// 갭 탐지/복구 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GapSettings {
    /// 갭 판정 배수 (간격 * tolerance 초과 시 갭)
    pub tolerance: f64,
    /// 갭 복구 사이 딜레이 (밀리초)
    pub repair_delay_ms: u64,
}

impl Default for GapSettings {
    fn default() -> Self {
        Self {
            tolerance: 1.5,
            repair_delay_ms: 500,
        }
    }
}

/// 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// 시리즈 CSV 디렉토리
    pub data_dir: PathBuf,
    /// 갭 리포트 디렉토리
    pub report_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/klines"),
            report_dir: PathBuf::from("data/reports"),
        }
    }
}

/// 수집기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// 동시에 처리할 종목 수
    pub concurrency: usize,
    /// 심볼 미지정 시 기본 심볼 목록
    pub default_symbols: Vec<String>,
    /// 기본 타임프레임
    pub default_interval: Timeframe,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            default_symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "BNBUSDT".to_string(),
                "SOLUSDT".to_string(),
                "XRPUSDT".to_string(),
            ],
            default_interval: Timeframe::H1,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// `path`가 주어지면 해당 파일이 반드시 있어야 하고,
    /// 없으면 [`DEFAULT_CONFIG_PATH`]를 있을 때만 읽습니다.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let file_source = match path {
            Some(p) => config::File::from(p)
                .format(config::FileFormat::Toml)
                .required(true),
            None => config::File::new(DEFAULT_CONFIG_PATH, config::FileFormat::Toml).required(false),
        };

        let builder = config::Config::builder()
            // 기본값으로 시작
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 파일에서 로드
            .add_source(file_source)
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("KLINE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("collector.default_symbols")
                    .with_list_parse_key("retry.retry_statuses")
                    .with_list_parse_key("retry.extra_retry_statuses")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 값의 유효성을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.fetch.page_limit == 0 || self.fetch.page_limit > MAX_PAGE_LIMIT {
            return Err(CoreError::Config(format!(
                "fetch.page_limit은 1 ~ {} 사이여야 합니다: {}",
                MAX_PAGE_LIMIT, self.fetch.page_limit
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config("retry.max_attempts는 1 이상이어야 합니다".into()));
        }
        if self.gap.tolerance.is_nan() || self.gap.tolerance <= 1.0 {
            return Err(CoreError::Config(format!(
                "gap.tolerance는 1보다 커야 합니다: {}",
                self.gap.tolerance
            )));
        }
        if self.collector.concurrency == 0 {
            return Err(CoreError::Config("collector.concurrency는 1 이상이어야 합니다".into()));
        }
        if self.exchange.base_url.trim().is_empty() {
            return Err(CoreError::Config("exchange.base_url이 비어 있습니다".into()));
        }
        Ok(())
    }
}

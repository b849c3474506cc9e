//! 에러 타입 정의.

use std::fmt;

use kline_core::CoreError;
use kline_data::DataError;
use kline_exchange::ExchangeError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 설정 에러 (잘못된 날짜 범위, 간격, 설정 파일)
    Config(String),
    /// 거래소 에러
    Exchange(ExchangeError),
    /// 저장소 에러
    Data(DataError),
    /// 리포트 작성 에러
    Report(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CollectorError {
    /// 시작 단계에서 치명적인 설정 에러인지 확인.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Exchange(e) => write!(f, "Exchange error: {}", e),
            Self::Data(e) => write!(f, "Storage error: {}", e),
            Self::Report(msg) => write!(f, "Report error: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ExchangeError> for CollectorError {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<csv::Error> for CollectorError {
    fn from(err: csv::Error) -> Self {
        Self::Report(err.to_string())
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Report(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

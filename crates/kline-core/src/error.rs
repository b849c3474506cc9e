//! 핵심 에러 타입.
//!
//! 설정과 입력 검증 단계에서 발생하는 에러를 정의합니다.
//! 이 단계의 에러만 시작 시점에 치명적입니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 설정/입력 에러인지 확인합니다 (시작 시점 중단 대상).
    pub fn is_config_error(&self) -> bool {
        matches!(self, CoreError::Config(_) | CoreError::InvalidInput(_))
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

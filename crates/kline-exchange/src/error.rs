//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 REST 호출 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러 (재시도 대상)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 타임아웃 (재시도 대상)
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 성공이 아닌 HTTP 상태 코드
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 거래소 API 에러 코드 (바이낸스 `{"code": .., "msg": ..}`)
    #[error("API error {code}: {message}")]
    ApiError { code: i64, message: String },

    /// 파싱/역직렬화 에러 (예상하지 못한 JSON 형태)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 재시도 횟수 소진
    #[error("Exhausted retries after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    /// 취소 토큰에 의해 중단
    #[error("Request cancelled")]
    Cancelled,

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// HTTP 상태 코드는 [`crate::RetryConfig`]에서 판정하므로 여기서는 5xx 기본 목록만 봅니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_) | ExchangeError::Timeout(_) => true,
            ExchangeError::HttpStatus { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// 응답 형태 에러인지 확인 (해당 윈도우는 빈 결과로 취급).
    pub fn is_malformed(&self) -> bool {
        matches!(self, ExchangeError::ParseError(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 시리즈 저장/조회 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(String),

    /// CSV 읽기/쓰기 오류
    #[error("CSV error: {0}")]
    Csv(String),

    /// 필드 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 블로킹 작업 실패 (spawn_blocking join 오류)
    #[error("Task error: {0}")]
    TaskError(String),
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => DataError::Io(err.to_string()),
            _ => DataError::Csv(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for DataError {
    fn from(err: tokio::task::JoinError) -> Self {
        DataError::TaskError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

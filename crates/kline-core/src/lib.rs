//! # Kline Core
//!
//! 과거 캔들 수집/복구 파이프라인의 핵심 도메인 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들(OHLCV) 및 시리즈 식별자
//! - 갭(누락 구간)과 조회 윈도우
//! - 타임프레임 정의
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;

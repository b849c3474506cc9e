//! 거래소 REST 연결 및 과거 캔들 조회.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - [`RetryingHttpClient`]: 지수 백오프 재시도가 적용된 GET 클라이언트
//! - [`KlineSource`]: 윈도우 단위 캔들 소스 trait
//! - Binance 캔들 커넥터
//! - [`SegmentedFetcher`]: 페이지 한도 단위 분할 조회

pub mod connector;
pub mod error;
pub mod historical;
pub mod http;
pub mod retry;
pub mod traits;

pub use connector::{parse_klines, BinanceConfig, BinanceKlineSource};
pub use error::*;
pub use historical::{
    plan_windows, FetchOutcome, FetcherConfig, SegmentedFetcher, WindowBatch,
};
pub use http::RetryingHttpClient;
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryStats};
pub use traits::*;

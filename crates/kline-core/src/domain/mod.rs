//! 파이프라인 도메인 모델.
//!
//! - [`Candle`]: 한 개의 OHLCV 캔들
//! - [`SeriesKey`]: (심볼, 타임프레임) 시리즈 식별자
//! - [`FetchWindow`]: 페이지 한도로 제한된 조회 구간
//! - [`Gap`]: 저장된 시리즈의 누락 구간

mod candle;
mod gap;
mod window;

pub use candle::*;
pub use gap::*;
pub use window::*;

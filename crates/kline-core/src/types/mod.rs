//! 워크스페이스 전반에서 사용되는 공통 타입.

mod decimal;
mod timeframe;

pub use decimal::*;
pub use timeframe::*;

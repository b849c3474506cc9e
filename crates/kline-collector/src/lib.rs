//! 과거 캔들 수집 및 갭 복구 collector.
//!
//! 이 crate는 다음을 제공합니다:
//! - 종목별 파이프라인 (초기 수집 → 갭 탐지 → 갭 복구)
//! - 동시 실행 드라이버 (워커 풀)
//! - 갭 리포트 (CSV)
//! - 실행 설정 및 통계

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{CollectorConfig, RunRequest};
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;

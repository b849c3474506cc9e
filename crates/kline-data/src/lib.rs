//! 캔들 시리즈 저장 및 무결성 검사.
//!
//! 이 crate는 다음을 제공합니다:
//! - 시리즈 저장소 trait과 CSV/인메모리 구현
//! - 정렬·중복 제거 병합
//! - 갭(누락 구간) 탐지
//! - 시리즈 범위 요약

pub mod error;
pub mod gap;
pub mod series;
pub mod storage;

pub use error::{DataError, Result};
pub use gap::{GapDetector, DEFAULT_GAP_TOLERANCE};
pub use series::{merge_candles, normalize_series, MergeOutcome, SeriesBounds};
pub use storage::{CsvSeriesStore, MemorySeriesStore, SeriesStore, SERIES_HEADER};

//! 시리즈 저장소.
//!
//! - [`CsvSeriesStore`]: 시리즈별 CSV 파일 (전체 재작성 + 원자적 교체)
//! - [`MemorySeriesStore`]: 테스트/드라이런용 인메모리 저장소

mod csv_store;
mod memory;

pub use csv_store::{CsvSeriesStore, SERIES_HEADER};
pub use memory::MemorySeriesStore;

use async_trait::async_trait;
use kline_core::{Candle, SeriesKey};

use crate::error::Result;
use crate::series::MergeOutcome;

/// (심볼, 타임프레임)별 정렬 시리즈 저장소.
///
/// 한 시리즈에는 한 번에 하나의 writer만 있어야 합니다. 병합은 전부 반영되거나
/// 전혀 반영되지 않으며, 실패해도 기존 시리즈는 그대로 남습니다.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// 저장된 시리즈를 오름차순으로 읽습니다. 없으면 빈 목록.
    async fn read(&self, key: &SeriesKey) -> Result<Vec<Candle>>;

    /// 캔들을 병합해 저장합니다. 같은 `open_time`이면 새 캔들이 이깁니다.
    async fn merge(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<MergeOutcome>;

    /// 시리즈를 삭제합니다. 존재했으면 `true`.
    async fn reset(&self, key: &SeriesKey) -> Result<bool>;
}

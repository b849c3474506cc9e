//! 인메모리 시리즈 저장소.

use std::collections::HashMap;

use async_trait::async_trait;
use kline_core::{Candle, SeriesKey};
use tokio::sync::RwLock;

use super::SeriesStore;
use crate::error::Result;
use crate::series::{merge_candles, MergeOutcome};

/// 프로세스 안에서만 유지되는 저장소.
#[derive(Debug, Default)]
pub struct MemorySeriesStore {
    series: RwLock<HashMap<SeriesKey, Vec<Candle>>>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 시리즈 수.
    pub async fn len(&self) -> usize {
        self.series.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.series.read().await.is_empty()
    }
}

#[async_trait]
impl SeriesStore for MemorySeriesStore {
    async fn read(&self, key: &SeriesKey) -> Result<Vec<Candle>> {
        Ok(self.series.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn merge(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<MergeOutcome> {
        let mut guard = self.series.write().await;
        let existing = guard.remove(key).unwrap_or_default();
        let (merged, outcome) = merge_candles(existing, candles);
        if !merged.is_empty() {
            guard.insert(key.clone(), merged);
        }
        Ok(outcome)
    }

    async fn reset(&self, key: &SeriesKey) -> Result<bool> {
        Ok(self.series.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kline_core::Timeframe;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_merge_read_reset() {
        let store = MemorySeriesStore::new();
        let key = SeriesKey::new("ethusdt", Timeframe::D1);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candle = Candle::new(t, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(10));

        let outcome = store.merge(&key, vec![candle.clone()]).await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(store.read(&key).await.unwrap(), vec![candle]);
        assert_eq!(store.len().await, 1);

        assert!(store.reset(&key).await.unwrap());
        assert!(store.is_empty().await);
    }
}

//! CSV 파일 기반 시리즈 저장소.
//!
//! 시리즈 하나당 `{data_dir}/{SYMBOL}_{interval}.csv` 파일 하나를 사용합니다.
//!
//! ```text
//! timestamp,open,high,low,close,volume
//! 2024-01-01T00:00:00.000Z,42283.58,42554.57,42261.02,42475.23,1271.68108
//! ```
//!
//! 병합은 기존 파일을 읽고, 합친 전체 시리즈를 임시 파일에 쓴 뒤 `rename`으로
//! 교체합니다. 쓰기 도중 실패하면 기존 파일은 그대로 남습니다.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kline_core::{parse_decimal_str, Candle, SeriesKey};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::SeriesStore;
use crate::error::{DataError, Result};
use crate::series::{merge_candles, normalize_series, MergeOutcome};

/// 시리즈 파일 헤더.
pub const SERIES_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// CSV 시리즈 저장소.
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    root: PathBuf,
}

impl CsvSeriesStore {
    /// 새 저장소 생성. 디렉토리는 첫 쓰기 때 만들어집니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 저장소 루트 디렉토리.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 시리즈 파일 경로.
    pub fn path_for(&self, key: &SeriesKey) -> PathBuf {
        self.root.join(format!("{}.csv", key.file_stem()))
    }
}

#[async_trait]
impl SeriesStore for CsvSeriesStore {
    async fn read(&self, key: &SeriesKey) -> Result<Vec<Candle>> {
        let path = self.path_for(key);
        let key = key.clone();
        tokio::task::spawn_blocking(move || read_normalized(&path, &key)).await?
    }

    async fn merge(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<MergeOutcome> {
        let root = self.root.clone();
        let path = self.path_for(key);
        let key = key.clone();

        tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&root)?;

            let existing = read_normalized(&path, &key)?;
            let (merged, outcome) = merge_candles(existing, candles);

            if outcome.changed() {
                write_atomic(&path, &merged)?;
            }

            debug!(
                series = %key,
                inserted = outcome.inserted,
                updated = outcome.updated,
                total = outcome.total,
                "시리즈 병합"
            );
            Ok(outcome)
        })
        .await?
    }

    async fn reset(&self, key: &SeriesKey) -> Result<bool> {
        let path = self.path_for(key);
        let key = key.clone();

        tokio::task::spawn_blocking(move || match fs::remove_file(&path) {
            Ok(()) => {
                info!(series = %key, path = %path.display(), "시리즈 삭제");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DataError::from(e)),
        })
        .await?
    }
}

/// 파일을 읽고, 정렬/중복 문제가 있으면 경고 후 정규화합니다.
fn read_normalized(path: &Path, key: &SeriesKey) -> Result<Vec<Candle>> {
    let candles = read_series_file(path)?;
    let (candles, changed) = normalize_series(candles);
    if changed {
        warn!(
            series = %key,
            path = %path.display(),
            "시리즈 파일이 정렬되지 않았거나 중복이 있어 정규화함"
        );
    }
    Ok(candles)
}

fn read_series_file(path: &Path) -> Result<Vec<Candle>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?;
    if headers.iter().ne(SERIES_HEADER.iter().copied()) {
        return Err(DataError::InvalidData(format!(
            "{}: unexpected header {:?}",
            path.display(),
            headers
        )));
    }

    let mut candles = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        // 헤더가 1행
        let line = idx + 2;

        if record.len() < SERIES_HEADER.len() {
            return Err(DataError::ParseError(format!(
                "{}:{}: expected {} fields, got {}",
                path.display(),
                line,
                SERIES_HEADER.len(),
                record.len()
            )));
        }

        let open_time = DateTime::parse_from_rfc3339(&record[0])
            .map_err(|e| {
                DataError::ParseError(format!("{}:{}: timestamp: {}", path.display(), line, e))
            })?
            .with_timezone(&Utc);

        let field = |i: usize| -> Result<Decimal> {
            parse_decimal_str(&record[i]).ok_or_else(|| {
                DataError::ParseError(format!(
                    "{}:{}: {} is not a number: {:?}",
                    path.display(),
                    line,
                    SERIES_HEADER[i],
                    &record[i]
                ))
            })
        };

        candles.push(Candle {
            open_time,
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        });
    }

    Ok(candles)
}

/// 임시 파일에 전체 시리즈를 쓰고 원래 경로로 교체합니다.
fn write_atomic(path: &Path, candles: &[Candle]) -> Result<()> {
    let tmp_path = path.with_extension("csv.tmp");

    let result = write_series_file(&tmp_path, candles).and_then(|()| {
        fs::rename(&tmp_path, path)?;
        Ok(())
    });

    if result.is_err() && tmp_path.is_file() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_series_file(path: &Path, candles: &[Candle]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(SERIES_HEADER)?;
    for c in candles {
        writer.write_record([
            c.open_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }

    let mut file = writer
        .into_inner()
        .map_err(|e| DataError::Io(e.error().to_string()))?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

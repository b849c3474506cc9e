//! 갭 리포트 (GapReportGenerator).
//!
//! 실행 한 번에 CSV 파일 하나를 만듭니다. 갭이 하나도 없으면 파일을 만들지 않습니다.
//!
//! ```text
//! symbol,gap_start,gap_end,missing_units,filled
//! BTCUSDT,2024-01-01T23:00:00.000Z,2024-01-02T01:00:00.000Z,1,true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::modules::pipeline::InstrumentResult;
use crate::Result;

/// 리포트 헤더.
pub const REPORT_HEADER: [&str; 5] = ["symbol", "gap_start", "gap_end", "missing_units", "filled"];

/// 갭 리포트 생성기.
#[derive(Debug, Clone)]
pub struct GapReportGenerator {
    report_dir: PathBuf,
}

impl GapReportGenerator {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    /// 리포트 디렉토리.
    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// 현재 시각 이름으로 리포트를 작성합니다.
    pub fn generate(&self, results: &[InstrumentResult]) -> Result<Option<PathBuf>> {
        self.generate_at(results, Utc::now())
    }

    /// 리포트를 작성하고 경로를 반환합니다. 갭이 없으면 `None`.
    pub fn generate_at(
        &self,
        results: &[InstrumentResult],
        generated_at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>> {
        let total_gaps: usize = results.iter().map(|r| r.gaps.len()).sum();
        if total_gaps == 0 {
            tracing::info!(instruments = results.len(), "갭 없음, 리포트 생략");
            return Ok(None);
        }

        fs::create_dir_all(&self.report_dir)?;
        let path = self.report_dir.join(format!(
            "gap_report_{}.csv",
            generated_at.format("%Y%m%d_%H%M%S_%3f")
        ));

        let mut sorted: Vec<&InstrumentResult> = results.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let mut wtr = csv::Writer::from_path(&path)?;
        wtr.write_record(REPORT_HEADER)?;

        for result in sorted {
            for repair in &result.gaps {
                wtr.write_record([
                    result.key.symbol.clone(),
                    repair.gap.start.to_rfc3339_opts(SecondsFormat::Millis, true),
                    repair.gap.end.to_rfc3339_opts(SecondsFormat::Millis, true),
                    repair.gap.missing_units.to_string(),
                    repair.filled.to_string(),
                ])?;
            }
        }
        wtr.flush()?;

        let filled: usize = results.iter().map(|r| r.filled_count()).sum();
        tracing::info!(
            path = %path.display(),
            gaps = total_gaps,
            filled,
            "갭 리포트 작성"
        );

        Ok(Some(path))
    }
}

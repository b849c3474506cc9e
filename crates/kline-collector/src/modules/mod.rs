//! 수집/복구 모듈.

pub mod backfill;
pub mod ohlcv_collect;
pub mod pipeline;
pub mod report;

pub use backfill::{filled_count, BackfillCoordinator, GapRepair};
pub use ohlcv_collect::{collect_initial, missing_edge_ranges, InitialFetch};
pub use pipeline::{
    run_fleet, FleetOutcome, InstrumentPipeline, InstrumentResult, InstrumentStatus,
    PipelineOptions, RunMode,
};
pub use report::{GapReportGenerator, REPORT_HEADER};

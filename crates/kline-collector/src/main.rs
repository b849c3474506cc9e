//! 과거 캔들 수집/갭 복구 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kline_core::{init_logging, init_logging_from_env, AppConfig, LogConfig, LogFormat, SeriesKey, Timeframe};
use kline_collector::modules::{
    run_fleet, GapReportGenerator, InstrumentPipeline, PipelineOptions, RunMode,
};
use kline_collector::{config::parse_symbols, CollectorConfig, RunRequest};
use kline_data::{CsvSeriesStore, GapDetector, SeriesStore};
use kline_exchange::{BinanceKlineSource, SegmentedFetcher};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "kline-collector")]
#[command(about = "Historical kline collector with gap detection and backfill", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml, 없으면 기본값)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct RangeArgs {
    /// 대상 심볼 (쉼표로 구분, 예: "BTCUSDT,ETHUSDT"). 생략 시 설정의 기본 목록
    #[arg(long)]
    symbols: Option<String>,

    /// 시작 날짜 (YYYY-MM-DD, 기본: 종료 1년 전)
    #[arg(long)]
    start: Option<String>,

    /// 종료 날짜, 해당 시각 직전까지 (YYYY-MM-DD, 기본: 오늘)
    #[arg(long)]
    end: Option<String>,

    /// 캔들 간격 (1m, 5m, 1h, 1d, ...)
    #[arg(long)]
    interval: Option<String>,

    /// 저장된 구간 바깥만 조회
    #[arg(long)]
    incremental: bool,
}

impl From<RangeArgs> for RunRequest {
    fn from(args: RangeArgs) -> Self {
        Self {
            symbols: args.symbols,
            start: args.start,
            end: args.end,
            interval: args.interval,
            incremental: args.incremental,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 전체 파이프라인 실행 (수집 → 갭 탐지 → 복구 → 리포트)
    Run(RangeArgs),

    /// 수집과 갭 탐지만 실행 (복구 없음)
    Collect(RangeArgs),

    /// 저장된 시리즈 갭 검사 (네트워크 사용 안 함)
    Check(RangeArgs),

    /// 저장된 시리즈의 갭만 복구
    Repair(RangeArgs),

    /// 시리즈 삭제
    Reset {
        /// 삭제할 심볼 (쉼표로 구분)
        #[arg(long)]
        symbols: String,

        /// 캔들 간격 (기본: 설정값)
        #[arg(long)]
        interval: Option<String>,

        /// 확인 없이 삭제
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 설정 로드 (실패 시 환경변수 기준 로깅으로 에러 출력)
    let app = match AppConfig::load(cli.config.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            let _ = init_logging_from_env();
            tracing::error!(error = %e, "설정 로드 실패");
            return Err(e.into());
        }
    };

    // 로깅 초기화
    let mut log_config = LogConfig::from_settings(&app.logging);
    if let Some(level) = cli.log_level {
        log_config.level = format!("kline_collector={0},kline_exchange={0},kline_data={0},{0}", level);
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.parse::<LogFormat>()?);
    }
    init_logging(log_config)?;

    tracing::info!("Kline Collector 시작");

    let (mode, range) = match cli.command {
        Commands::Run(range) => (RunMode::Full, range),
        Commands::Collect(range) => (RunMode::CollectOnly, range),
        Commands::Check(range) => (RunMode::CheckOnly, range),
        Commands::Repair(range) => (RunMode::RepairOnly, range),
        Commands::Reset {
            symbols,
            interval,
            yes,
        } => {
            return reset_series(&app, &symbols, interval.as_deref(), yes)
                .await
                .map_err(Into::into);
        }
    };

    let config = CollectorConfig::from_app(&app, &range.into())?;
    tracing::info!(
        symbols = config.symbols.len(),
        interval = %config.timeframe,
        start = %config.start,
        end = %config.end,
        incremental = config.incremental,
        mode = ?mode,
        "실행 설정 완료"
    );

    let source = BinanceKlineSource::new(config.exchange.clone(), config.retry.clone())
        .context("거래소 클라이언트 생성 실패")?;
    let fetcher = SegmentedFetcher::new(Arc::new(source), config.fetch.clone());
    let store: Arc<dyn SeriesStore> = Arc::new(CsvSeriesStore::new(&config.data_dir));
    let pipeline = Arc::new(InstrumentPipeline::new(
        fetcher,
        store,
        GapDetector::new(config.gap_tolerance),
        config.repair_delay,
        PipelineOptions::from_config(&config, mode),
    ));

    // Ctrl-C → 취소 (이미 병합된 데이터는 유지)
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 진행 중인 요청 후 중단합니다");
            signal_token.cancel();
        }
    });

    let outcome = run_fleet(pipeline, config.symbols.clone(), config.concurrency, cancel).await;

    for result in outcome.results.iter().filter(|r| r.is_failed()) {
        tracing::warn!(symbol = %result.key.symbol, status = ?result.status, "종목 실패");
    }

    let report = GapReportGenerator::new(&config.report_dir)
        .generate(&outcome.results)
        .context("갭 리포트 작성 실패")?;
    match report {
        Some(path) => tracing::info!(path = %path.display(), "리포트 생성"),
        None => tracing::info!("갭 없음"),
    }

    outcome.stats.log_summary(match mode {
        RunMode::Full => "수집 및 복구",
        RunMode::CollectOnly => "수집",
        RunMode::RepairOnly => "갭 복구",
        RunMode::CheckOnly => "무결성 검사",
    });

    tracing::info!("Kline Collector 종료");
    Ok(())
}

/// 시리즈 파일 삭제.
async fn reset_series(
    app: &AppConfig,
    symbols: &str,
    interval: Option<&str>,
    confirmed: bool,
) -> anyhow::Result<()> {
    let timeframe = match interval {
        Some(raw) => raw.parse::<Timeframe>()?,
        None => app.collector.default_interval,
    };
    let symbols = parse_symbols(symbols);
    anyhow::ensure!(!symbols.is_empty(), "삭제할 심볼이 없습니다");

    if !confirmed {
        tracing::warn!(
            symbols = symbols.join(","),
            interval = %timeframe,
            "삭제하려면 --yes를 지정하세요"
        );
        return Ok(());
    }

    let store = CsvSeriesStore::new(&app.storage.data_dir);
    tracing::info!(data_dir = %store.root().display(), count = symbols.len(), "시리즈 삭제 시작");
    for symbol in symbols {
        let key = SeriesKey::new(symbol, timeframe);
        let removed = store
            .reset(&key)
            .await
            .with_context(|| format!("{} 삭제 실패", key))?;
        if !removed {
            tracing::info!(series = %key, "삭제할 시리즈 없음");
        }
    }
    Ok(())
}

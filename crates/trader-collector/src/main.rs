//! 과거 바 백필 CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trader_collector::config::{mask_database_url, LoggingSettings};
use trader_collector::{
    BackfillConfig, BackfillCoordinator, EngineContext, IngestPlan, MarketCalendar, MarketHours,
    RunReport, Scheduler,
};
use trader_core::{Market, Ticker};
use trader_data::{
    BarRepository, Database, MemoryBarRepository, MemoryProgressStore, PgBarRepository,
    PgProgressStore, ProgressStore,
};
use trader_exchange::{PolygonProvider, RequestBudget};

#[derive(Parser)]
#[command(name = "trader-collector")]
#[command(about = "Checkpointed historical bar backfill", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/backfill.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error). 설정 파일 값보다 우선
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 설정 기간 백필 1회 실행
    Run {
        /// 종목 목록 덮어쓰기 (쉼표 구분, 예: "AAPL,MSFT")
        #[arg(long)]
        tickers: Option<String>,

        /// 바, 메타데이터, 체크포인트를 메모리에만 기록 (DB 체크포인트는 읽기만 함)
        #[arg(long)]
        dry_run: bool,

        /// 결과를 표 대신 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 체크포인트 관리
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// 시장 운영 상태 조회
    SchedulerStatus,

    /// 장 마감 후 매일 백필 실행 (Ctrl+C로 종료)
    Daemon,
}

/// 체크포인트 관리 액션
#[derive(Subcommand)]
enum CheckpointAction {
    /// 체크포인트 조회
    List {
        /// 특정 시장만 조회
        #[arg(long)]
        market: Option<String>,
    },

    /// 특정 종목 체크포인트 삭제 (다음 실행 시 시작일부터 다시 수집)
    Clear {
        #[arg(long)]
        market: String,
        #[arg(long)]
        ticker: String,
    },
}

/// 로깅 초기화. 파일 로그를 켜면 반환된 가드를 main 종료까지 유지해야 합니다.
fn init_logging(level: &str, logging: &LoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level.contains('=') || level.contains(',') {
            level.into()
        } else {
            format!(
                "trader_collector={},trader_data={},trader_exchange={}",
                level, level, level
            )
            .into()
        }
    });

    let (plain, json) = if logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    let (file_layer, guard) = match logging.file.as_deref() {
        Some(path) => {
            let path = PathBuf::from(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .context("logging.file에 파일 이름이 없습니다")?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// 실행 준비가 끝난 백필 환경.
struct Engine {
    db: Database,
    database_url: String,
    provider: Arc<PolygonProvider>,
    budget: Arc<RequestBudget>,
}

/// 취소 신호 쌍. `cancel`은 새 날짜 시작을 막고 `abort`는 진행 중인 날짜까지 중단합니다.
#[derive(Clone, Default)]
struct Shutdown {
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl Shutdown {
    fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            abort: self.abort.child_token(),
        }
    }
}

impl Engine {
    async fn connect(config: &BackfillConfig) -> anyhow::Result<Self> {
        let db_config = config.database_config()?;
        tracing::debug!(database_url = %mask_database_url(&db_config.url), "DB 연결");

        let db = Database::connect(&db_config)
            .await
            .context("데이터베이스 연결 실패")?;
        db.ensure_schema().await.context("스키마 생성 실패")?;

        let provider = Arc::new(PolygonProvider::new(config.polygon_config()?)?);
        let budget = Arc::new(RequestBudget::per_minute(config.provider.requests_per_minute));

        Ok(Self {
            db,
            database_url: db_config.url,
            provider,
            budget,
        })
    }

    /// 새 설정으로 프로바이더와 요청 예산 재생성. DB 연결은 재시작해야 바뀝니다.
    fn reload(&mut self, config: &BackfillConfig) -> anyhow::Result<()> {
        let provider = Arc::new(PolygonProvider::new(config.polygon_config()?)?);
        let db_config = config.database_config()?;
        if db_config.url != self.database_url {
            tracing::warn!(
                database_url = %mask_database_url(&db_config.url),
                "database 설정 변경은 재시작 후 적용됩니다"
            );
        }

        self.provider = provider;
        self.budget = Arc::new(RequestBudget::per_minute(config.provider.requests_per_minute));
        Ok(())
    }

    /// 고정 휴장일 + (설정 시) 프로바이더 휴장일로 달력 구성.
    async fn calendar(&self, config: &BackfillConfig, plan: &IngestPlan) -> anyhow::Result<MarketCalendar> {
        let mut calendar = MarketCalendar::new(plan.range.time_zone())
            .with_holidays(&plan.market, config.holidays()?);
        if config.engine.use_holiday_oracle {
            calendar
                .load_from_oracle(&plan.market, self.provider.as_ref())
                .await;
        }
        Ok(calendar)
    }

    async fn backfill(
        &self,
        config: &BackfillConfig,
        plan: IngestPlan,
        shutdown: Shutdown,
        dry_run: bool,
    ) -> anyhow::Result<RunReport> {
        let calendar = self.calendar(config, &plan).await?;
        let durable = PgProgressStore::new(self.db.pool().clone());

        let (progress, bars): (Arc<dyn ProgressStore>, Arc<dyn BarRepository>) = if dry_run {
            tracing::warn!("dry-run: 결과와 체크포인트를 메모리에만 기록");
            let snapshot =
                MemoryProgressStore::snapshot_of(&durable, &plan.market, &plan.tickers).await?;
            (Arc::new(snapshot), Arc::new(MemoryBarRepository::new()))
        } else {
            (
                Arc::new(durable),
                Arc::new(PgBarRepository::new(
                    self.db.pool().clone(),
                    plan.range.time_zone(),
                )),
            )
        };

        let ctx = EngineContext {
            provider: self.provider.clone(),
            progress,
            bars,
            calendar: Arc::new(calendar),
            budget: self.budget.clone(),
            retry: config.retry_config(),
            cancel: shutdown.cancel,
            abort: shutdown.abort,
        };

        let coordinator = BackfillCoordinator::new(ctx, config.engine.concurrency);
        let report = coordinator.run(plan).await;
        report.log_summary("백필");
        Ok(report)
    }
}

/// 첫 Ctrl+C는 새 날짜 시작을 막고, 두 번째는 진행 중인 날짜까지 중단.
fn cancel_on_ctrl_c(shutdown: Shutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("종료 신호 수신, 진행 중인 날짜까지 처리 후 종료합니다 (다시 누르면 즉시 중단)");
        shutdown.cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("강제 종료 신호 수신, 진행 중인 날짜를 중단합니다");
            shutdown.abort.cancel();
        }
    });
}

fn scheduler_for(config: &BackfillConfig, plan: &IngestPlan) -> anyhow::Result<Scheduler> {
    let (open_time, close_time) = config.daemon.session()?;
    let calendar = MarketCalendar::new(plan.range.time_zone())
        .with_holidays(&plan.market, config.holidays()?);
    let hours = MarketHours::new(
        plan.market.clone(),
        plan.range.time_zone(),
        open_time,
        close_time,
    );
    Ok(Scheduler::new(
        hours,
        Arc::new(calendar),
        config.daemon.delay_after_close_minutes,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = BackfillConfig::load(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let _guard = init_logging(&level, &config.logging)?;

    let run_id = uuid::Uuid::new_v4();
    execute(cli.command, config, cli.config)
        .instrument(tracing::info_span!("backfill", run_id = %run_id))
        .await
}

async fn execute(
    command: Commands,
    mut config: BackfillConfig,
    config_path: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    tracing::info!("Backfill Collector 시작");

    let exit = match command {
        Commands::Run {
            tickers,
            dry_run,
            json,
        } => {
            if let Some(tickers) = tickers.as_deref() {
                config.override_tickers(tickers);
            }
            let plan = config.plan()?;
            let engine = Engine::connect(&config).await?;

            let shutdown = Shutdown::default();
            cancel_on_ctrl_c(shutdown.clone());

            let report = engine.backfill(&config, plan, shutdown, dry_run).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render_table());
            }
            engine.db.close().await;

            let status = report.status(config.engine.require_all_success);
            tracing::info!(status = ?status, "실행 종료");
            ExitCode::from(status.exit_code())
        }
        Commands::Checkpoint { action } => {
            let db = Database::connect(&config.database_config()?)
                .await
                .context("데이터베이스 연결 실패")?;
            db.ensure_schema().await.context("스키마 생성 실패")?;
            let store = PgProgressStore::new(db.pool().clone());

            match action {
                CheckpointAction::List { market } => {
                    let market = market.as_deref().map(Market::new).transpose()?;
                    let checkpoints = store.list(market.as_ref()).await?;
                    if checkpoints.is_empty() {
                        println!("저장된 체크포인트가 없습니다.");
                    } else {
                        println!("{:-<64}", "");
                        for cp in checkpoints {
                            println!(
                                "  {:<10} | {:<12} | 마지막 처리: {}",
                                cp.market.as_str(),
                                cp.ticker.as_str(),
                                cp.last_processed.format("%Y-%m-%d %H:%M:%S UTC")
                            );
                        }
                        println!("{:-<64}", "");
                    }
                }
                CheckpointAction::Clear { market, ticker } => {
                    let market = Market::new(&market)?;
                    let ticker = Ticker::new(&ticker)?;
                    if store.clear(&market, &ticker).await? {
                        println!("{}/{} 체크포인트 삭제 완료", market, ticker);
                    } else {
                        println!("{}/{} 체크포인트가 없습니다", market, ticker);
                    }
                }
            }

            db.close().await;
            ExitCode::SUCCESS
        }
        Commands::SchedulerStatus => {
            let plan = config.plan()?;
            let scheduler = scheduler_for(&config, &plan)?;
            println!("{}", scheduler.status_summary(Utc::now()));
            ExitCode::SUCCESS
        }
        Commands::Daemon => {
            let plan = config.plan()?;
            let mut scheduler = scheduler_for(&config, &plan)?;
            let mut engine = Engine::connect(&config).await?;

            let shutdown = Shutdown::default();
            cancel_on_ctrl_c(shutdown.clone());

            tracing::info!(
                market = %plan.market,
                next_run_secs = scheduler.seconds_until_next_run(Utc::now()),
                "데몬 모드 시작"
            );

            let mut interval = tokio::time::interval(config.daemon.poll_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if !scheduler.should_run_daily(Utc::now()) {
                    continue;
                }

                // 실행마다 새 설정 스냅샷 사용. 읽기 실패 시 이전 설정 유지
                match BackfillConfig::load(config_path.as_deref()) {
                    Ok(fresh) => match engine.reload(&fresh) {
                        Ok(()) => config = fresh,
                        Err(e) => tracing::warn!(error = %e, "프로바이더 재생성 실패, 이전 설정 사용"),
                    },
                    Err(e) => tracing::warn!(error = %e, "설정 재로드 실패, 이전 설정 사용"),
                }
                let plan = match config.plan() {
                    Ok(plan) => plan,
                    Err(e) => {
                        tracing::error!(error = %e, "실행 계획 생성 실패");
                        continue;
                    }
                };

                match scheduler_for(&config, &plan) {
                    Ok(fresh) => {
                        scheduler = fresh.with_last_daily_run(scheduler.last_daily_run());
                    }
                    Err(e) => tracing::warn!(error = %e, "daemon 설정 오류, 이전 스케줄 유지"),
                }
                if interval.period() != config.daemon.poll_interval() {
                    interval = tokio::time::interval(config.daemon.poll_interval());
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    interval.reset();
                }

                match engine.backfill(&config, plan, shutdown.child(), false).await {
                    Ok(report) => tracing::info!(
                        status = ?report.status(config.engine.require_all_success),
                        next_run_secs = scheduler.seconds_until_next_run(Utc::now()),
                        "일일 백필 종료"
                    ),
                    Err(e) => tracing::error!(error = %e, "일일 백필 실패"),
                }
            }

            engine.db.close().await;
            ExitCode::SUCCESS
        }
    };

    tracing::info!("Backfill Collector 종료");
    Ok(exit)
}

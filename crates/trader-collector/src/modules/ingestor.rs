//! 종목별 백필 수집기.
//!
//! 한 종목의 체크포인트부터 설정 종료일까지 날짜 단위로 진행합니다.
//!
//! ```text
//! Resuming -> Iterating -> Fetching -> Persisting -> Iterating -> ... -> Completed
//!                 |            |            |
//!                 +------------+------------+--> Failed / Cancelled
//! ```
//!
//! 날짜 하나의 처리 순서:
//! 1. 종목 메타데이터 조회 후 저장
//! 2. 활성 종목이면 해당 날짜의 바를 모두 조회한 뒤 한 번에 저장
//! 3. 체크포인트 갱신
//!
//! 체크포인트는 3단계에서만 기록하므로 중간에 실패한 날짜는 다음 실행에서 다시 처리됩니다.
//! 취소 신호는 날짜 사이에서만 확인합니다. 이미 시작한 날짜는 재시도 한도 안에서 끝까지
//! 진행하며, 강제 종료 신호(`abort`)를 받은 경우에만 중간에 포기합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use trader_core::{Bar, Progress, Ticker};
use trader_data::{BarRepository, ProgressStore};
use trader_exchange::{with_retry, BarsRequest, MarketDataProvider, RequestBudget, RetryConfig};

use super::calendar::MarketCalendar;
use crate::config::IngestPlan;
use crate::error::{CollectorError, Result};
use crate::stats::{IngestionOutcome, OutcomeStatus};

/// 수집기들이 공유하는 실행 환경.
#[derive(Clone)]
pub struct EngineContext {
    pub provider: Arc<dyn MarketDataProvider>,
    pub progress: Arc<dyn ProgressStore>,
    pub bars: Arc<dyn BarRepository>,
    pub calendar: Arc<MarketCalendar>,
    /// 프로세스 전체 요청 예산
    pub budget: Arc<RequestBudget>,
    pub retry: RetryConfig,
    /// 새 날짜와 새 종목 시작을 막는 취소 신호. 진행 중인 날짜는 끝까지 처리합니다.
    pub cancel: CancellationToken,
    /// 진행 중인 날짜의 재시도 대기까지 중단하는 강제 종료 신호.
    pub abort: CancellationToken,
}

/// 수집기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// 체크포인트 조회
    Resuming,
    /// 다음 날짜 선택
    Iterating,
    /// 프로바이더 조회 중
    Fetching(NaiveDate),
    /// 저장 중
    Persisting(NaiveDate),
    Completed,
    Failed,
    Cancelled,
}

/// 종목 하나의 백필 수집기.
pub struct TickerIngestor {
    ctx: EngineContext,
    plan: Arc<IngestPlan>,
    ticker: Ticker,
    state: IngestState,
    outcome: IngestionOutcome,
}

impl TickerIngestor {
    pub fn new(ctx: EngineContext, plan: Arc<IngestPlan>, ticker: Ticker) -> Self {
        let outcome = IngestionOutcome::new(plan.market.clone(), ticker.clone());
        Self {
            ctx,
            plan,
            ticker,
            state: IngestState::Resuming,
            outcome,
        }
    }

    fn transition(&mut self, next: IngestState) {
        debug!(from = ?self.state, to = ?next, "상태 전이");
        self.state = next;
    }

    /// 종료 상태까지 실행하고 결과를 반환합니다. 에러는 결과에 기록되며 전파되지 않습니다.
    #[instrument(
        name = "ingest",
        skip(self),
        fields(market = %self.plan.market, ticker = %self.ticker)
    )]
    pub async fn run(mut self) -> IngestionOutcome {
        match self.drive().await {
            Ok(()) => {
                self.transition(IngestState::Completed);
                self.outcome.status = OutcomeStatus::Completed;
                info!(
                    dates_processed = self.outcome.dates_processed,
                    dates_skipped = self.outcome.dates_skipped,
                    bars_written = self.outcome.bars_written,
                    "종목 백필 완료"
                );
            }
            Err(CollectorError::Cancelled) => {
                self.transition(IngestState::Cancelled);
                self.outcome.status = OutcomeStatus::Cancelled;
                self.outcome.error = Some(CollectorError::Cancelled.to_string());
                info!(
                    last_processed = ?self.outcome.last_processed_date,
                    "종목 백필 취소됨"
                );
            }
            Err(e) => {
                self.transition(IngestState::Failed);
                self.outcome.status = OutcomeStatus::Failed;
                warn!(
                    error = %e,
                    last_processed = ?self.outcome.last_processed_date,
                    "종목 백필 실패"
                );
                self.outcome.error = Some(e.to_string());
            }
        }

        self.outcome
    }

    async fn drive(&mut self) -> Result<()> {
        let Some(start) = self.resume().await? else {
            return Ok(());
        };

        self.transition(IngestState::Iterating);
        let plan = Arc::clone(&self.plan);

        for date in plan.range.days_from(start) {
            if self.ctx.cancel.is_cancelled() {
                return Err(CollectorError::Cancelled);
            }

            if !self.ctx.calendar.is_eligible(date, &plan.market) {
                debug!(date = %date, "거래일 아님, 건너뜀");
                self.outcome.dates_skipped += 1;
                continue;
            }

            self.process_date(date).await?;
        }

        Ok(())
    }

    /// 체크포인트에서 시작 날짜 결정. 이미 종료일까지 처리했으면 `None`.
    async fn resume(&mut self) -> Result<Option<NaiveDate>> {
        let range = &self.plan.range;
        let stored = self
            .ctx
            .progress
            .get(&self.plan.market, &self.ticker)
            .await?;

        let start = match stored {
            Some(progress) => {
                let last = progress.last_processed_date(range.time_zone());
                self.outcome.last_processed_date = Some(last);
                match progress.resume_date(range.time_zone()) {
                    Some(next) => next.max(range.begin()),
                    None => return Ok(None),
                }
            }
            None => range.begin(),
        };

        if start > range.end() {
            info!(
                last_processed = ?self.outcome.last_processed_date,
                end = %range.end(),
                "이미 종료일까지 처리됨"
            );
            return Ok(None);
        }

        debug!(start = %start, end = %range.end(), "백필 시작 날짜 결정");
        Ok(Some(start))
    }

    async fn process_date(&mut self, date: NaiveDate) -> Result<()> {
        self.transition(IngestState::Fetching(date));
        let metadata = with_retry(&self.ctx.retry, &self.ctx.budget, &self.ctx.abort, || {
            self.ctx.provider.fetch_ticker_metadata(&self.ticker, date)
        })
        .await?;

        self.transition(IngestState::Persisting(date));
        self.ctx.bars.write_ticker_metadata(&metadata).await?;

        if metadata.active {
            self.transition(IngestState::Fetching(date));
            let bars = self.fetch_day_bars(date).await?;

            self.transition(IngestState::Persisting(date));
            let written = self.ctx.bars.write_bars(&bars).await?;
            self.outcome.bars_written += written;
            debug!(date = %date, bars = written, "바 저장");
        } else {
            debug!(date = %date, "비활성 종목, 바 조회 생략");
            self.outcome.dates_inactive += 1;
        }

        let progress = Progress::new(
            self.plan.market.clone(),
            self.ticker.clone(),
            self.plan.range.day_start(date),
        );
        self.ctx.progress.set(&progress).await?;

        self.outcome.dates_processed += 1;
        self.outcome.last_processed_date = Some(date);
        self.transition(IngestState::Iterating);
        Ok(())
    }

    /// 하루치 바 전체 조회. 타임스탬프 오름차순이며 중복 타임스탬프는 나중 값을 사용합니다.
    async fn fetch_day_bars(&self, date: NaiveDate) -> Result<Vec<Bar>> {
        let range = &self.plan.range;
        let request = BarsRequest {
            ticker: self.ticker.clone(),
            granularity: self.plan.granularity,
            from: range.day_start(date),
            to: range.day_end_exclusive(date) - Duration::milliseconds(1),
        };

        // 페이지 중간 실패 시 날짜 전체를 처음부터 다시 조회
        let fetched: Vec<Bar> = with_retry(&self.ctx.retry, &self.ctx.budget, &self.ctx.abort, || {
            self.ctx.provider.fetch_bars(&request).try_collect::<Vec<Bar>>()
        })
        .await?;

        let by_timestamp: BTreeMap<i64, Bar> = fetched
            .into_iter()
            .map(|bar| (bar.timestamp_millis, bar))
            .collect();

        Ok(by_timestamp.into_values().collect())
    }
}

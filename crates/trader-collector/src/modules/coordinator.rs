//! 여러 종목의 백필을 동시에 실행하는 코디네이터.
//!
//! 종목마다 [`TickerIngestor`]를 하나씩 띄우고 세마포어로 동시 실행 수를 제한합니다.
//! 한 종목의 실패는 다른 종목에 영향을 주지 않습니다.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use super::ingestor::{EngineContext, TickerIngestor};
use crate::config::IngestPlan;
use crate::stats::{IngestionOutcome, OutcomeStatus, RunReport};

/// 백필 코디네이터
pub struct BackfillCoordinator {
    ctx: EngineContext,
    concurrency: usize,
}

impl BackfillCoordinator {
    /// `concurrency`가 0이면 1로 취급합니다.
    pub fn new(ctx: EngineContext, concurrency: usize) -> Self {
        Self {
            ctx,
            concurrency: concurrency.max(1),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// 모든 종목이 종료 상태가 될 때까지 실행.
    ///
    /// 결과 순서는 설정의 종목 순서와 같습니다. 취소 신호 이후에는 새 종목을 시작하지 않으며,
    /// 시작하지 못한 종목은 `Cancelled`로 보고됩니다.
    pub async fn run(&self, plan: IngestPlan) -> RunReport {
        let started = Instant::now();
        let plan = Arc::new(plan);
        let total = plan.tickers.len();

        info!(
            market = %plan.market,
            tickers = total,
            begin = %plan.range.begin(),
            end = %plan.range.end(),
            days = plan.range.len_days(),
            granularity = %plan.granularity,
            concurrency = self.concurrency,
            "백필 시작"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut outcomes: Vec<Option<IngestionOutcome>> = vec![None; total];

        for (index, ticker) in plan.tickers.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ingestor = TickerIngestor::new(self.ctx.clone(), Arc::clone(&plan), ticker.clone());
            let market = plan.market.clone();
            let ticker = ticker.clone();

            tasks.spawn(async move {
                let outcome = match AssertUnwindSafe(ingestor.run()).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(ticker = %ticker, "수집 태스크 패닉");
                        IngestionOutcome {
                            status: OutcomeStatus::Failed,
                            error: Some("수집 태스크 패닉".to_string()),
                            ..IngestionOutcome::new(market, ticker)
                        }
                    }
                };
                drop(permit);
                (index, outcome)
            }
            .in_current_span());
        }

        let mut finished = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    finished += 1;
                    info!(
                        ticker = %outcome.ticker,
                        status = ?outcome.status,
                        progress = format!("{}/{}", finished, total),
                        "종목 종료"
                    );
                    outcomes[index] = Some(outcome);
                }
                Err(e) => error!(error = %e, "수집 태스크 비정상 종료"),
            }
        }

        let outcomes: Vec<IngestionOutcome> = outcomes
            .into_iter()
            .zip(plan.tickers.iter())
            .map(|(outcome, ticker)| {
                outcome.unwrap_or_else(|| {
                    IngestionOutcome::cancelled_before_start(plan.market.clone(), ticker.clone())
                })
            })
            .collect();

        if self.ctx.cancel.is_cancelled() {
            let cancelled = outcomes
                .iter()
                .filter(|o| o.status == OutcomeStatus::Cancelled)
                .count();
            warn!(cancelled, "취소 신호 수신, 백필 중단");
        }

        RunReport {
            outcomes,
            elapsed: started.elapsed(),
        }
    }
}

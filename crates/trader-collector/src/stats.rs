//! 종목별 수집 결과와 실행 보고서.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use trader_core::{Market, Ticker};

/// 종목 수집 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// 설정 기간의 모든 날짜를 처리 또는 건너뜀
    Completed,
    /// 복구 불가 에러
    Failed,
    /// 취소 신호로 중단 (또는 시작 전 취소)
    Cancelled,
}

/// 종목 하나의 수집 결과.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub market: Market,
    pub ticker: Ticker,
    pub status: OutcomeStatus,
    /// 메타데이터/바 저장과 체크포인트 기록까지 끝난 날짜 수
    pub dates_processed: usize,
    /// 거래일이 아니어서 건너뛴 날짜 수
    pub dates_skipped: usize,
    /// 비활성 상태여서 바를 조회하지 않은 날짜 수
    pub dates_inactive: usize,
    /// 저장한 바 수
    pub bars_written: usize,
    /// 마지막으로 체크포인트를 기록한 날짜 (이번 실행 이전 값 포함)
    pub last_processed_date: Option<NaiveDate>,
    /// 마지막 에러 (실패/취소 시)
    pub error: Option<String>,
}

impl IngestionOutcome {
    pub fn new(market: Market, ticker: Ticker) -> Self {
        Self {
            market,
            ticker,
            status: OutcomeStatus::Completed,
            dates_processed: 0,
            dates_skipped: 0,
            dates_inactive: 0,
            bars_written: 0,
            last_processed_date: None,
            error: None,
        }
    }

    /// 시작하지 못하고 취소된 종목.
    pub fn cancelled_before_start(market: Market, ticker: Ticker) -> Self {
        Self {
            status: OutcomeStatus::Cancelled,
            error: Some("시작 전 취소됨".to_string()),
            ..Self::new(market, ticker)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

/// 실행 전체 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// 모든 종목 완료
    Success,
    /// 일부 실패/취소, 부분 성공 허용 설정
    Degraded,
    /// 일부 실패/취소, 전체 성공 필수 설정
    Fatal,
}

impl RunStatus {
    /// 프로세스 종료 코드.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Fatal => 1,
            Self::Degraded => 2,
        }
    }
}

/// 실행 보고서. 종목 순서는 설정 순서와 같습니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<IngestionOutcome>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn status(&self, require_all_success: bool) -> RunStatus {
        if self.outcomes.iter().all(IngestionOutcome::is_completed) {
            RunStatus::Success
        } else if require_all_success {
            RunStatus::Fatal
        } else {
            RunStatus::Degraded
        }
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn total_bars(&self) -> usize {
        self.outcomes.iter().map(|o| o.bars_written).sum()
    }

    pub fn outcome(&self, ticker: &Ticker) -> Option<&IngestionOutcome> {
        self.outcomes.iter().find(|o| &o.ticker == ticker)
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.outcomes.len(),
            completed = self.count(OutcomeStatus::Completed),
            failed = self.count(OutcomeStatus::Failed),
            cancelled = self.count(OutcomeStatus::Cancelled),
            dates_processed = self.outcomes.iter().map(|o| o.dates_processed).sum::<usize>(),
            total_bars = self.total_bars(),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );

        for outcome in self.outcomes.iter().filter(|o| !o.is_completed()) {
            tracing::warn!(
                ticker = %outcome.ticker,
                status = ?outcome.status,
                dates_processed = outcome.dates_processed,
                last_processed = ?outcome.last_processed_date,
                error = outcome.error.as_deref().unwrap_or("-"),
                "미완료 종목"
            );
        }
    }

    /// 콘솔 출력용 표.
    pub fn render_table(&self) -> String {
        let mut lines = vec![format!(
            "{:<12} {:<10} {:>9} {:>8} {:>9} {:>10}  {}",
            "TICKER", "STATUS", "PROCESSED", "SKIPPED", "BARS", "LAST", "ERROR"
        )];

        for o in &self.outcomes {
            lines.push(format!(
                "{:<12} {:<10} {:>9} {:>8} {:>9} {:>10}  {}",
                o.ticker.as_str(),
                format!("{:?}", o.status),
                o.dates_processed,
                o.dates_skipped,
                o.bars_written,
                o.last_processed_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                o.error.as_deref().unwrap_or(""),
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(ticker: &str, status: OutcomeStatus) -> IngestionOutcome {
        IngestionOutcome {
            status,
            ..IngestionOutcome::new(Market::new("STOCKS").unwrap(), Ticker::new(ticker).unwrap())
        }
    }

    #[test]
    fn test_run_status() {
        let all_ok = RunReport {
            outcomes: vec![outcome("A", OutcomeStatus::Completed)],
            elapsed: Duration::ZERO,
        };
        assert_eq!(all_ok.status(true), RunStatus::Success);

        let partial = RunReport {
            outcomes: vec![
                outcome("A", OutcomeStatus::Completed),
                outcome("B", OutcomeStatus::Failed),
            ],
            elapsed: Duration::ZERO,
        };
        assert_eq!(partial.status(false), RunStatus::Degraded);
        assert_eq!(partial.status(true), RunStatus::Fatal);
        assert_eq!(partial.status(true).exit_code(), 1);
    }

    #[test]
    fn test_empty_report_is_success() {
        assert_eq!(RunReport::default().status(true), RunStatus::Success);
    }

    #[test]
    fn test_render_table_lists_every_ticker() {
        let report = RunReport {
            outcomes: vec![
                outcome("AAPL", OutcomeStatus::Completed),
                outcome("MSFT", OutcomeStatus::Cancelled),
            ],
            elapsed: Duration::ZERO,
        };
        let table = report.render_table();
        assert!(table.contains("AAPL"));
        assert!(table.contains("Cancelled"));
        assert_eq!(table.lines().count(), 3);
    }
}

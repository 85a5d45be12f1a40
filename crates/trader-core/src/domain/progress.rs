//! 종목별 백필 진행 상황 (체크포인트).

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{Market, Ticker};

/// `(market, ticker)`별 마지막으로 완전히 처리된 날짜의 시작 시각.
///
/// 같은 키에 대해 `last_processed`는 단조 증가합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub market: Market,
    pub ticker: Ticker,
    pub last_processed: DateTime<Utc>,
}

impl Progress {
    pub fn new(market: Market, ticker: Ticker, last_processed: DateTime<Utc>) -> Self {
        Self {
            market,
            ticker,
            last_processed,
        }
    }

    /// 지정 타임존 기준 마지막 처리 날짜.
    pub fn last_processed_date(&self, tz: Tz) -> NaiveDate {
        self.last_processed.with_timezone(&tz).date_naive()
    }

    /// 재개 시작 날짜 (마지막 처리일 다음 날).
    pub fn resume_date(&self, tz: Tz) -> Option<NaiveDate> {
        self.last_processed_date(tz).succ_opt()
    }
}

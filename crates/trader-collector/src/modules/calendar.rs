//! 거래일 판정.
//!
//! 주말(토/일)은 항상 제외하고, 등록된 휴장일도 제외합니다. 휴장일은 실행 전에
//! 설정 파일과 [`HolidayOracle`]에서 미리 읽어 두므로 [`MarketCalendar::is_eligible`]은
//! I/O 없는 순수 함수입니다.
//!
//! 오라클은 앞으로 다가올 휴장일만 알려 주므로 과거 기간 백필에서는 휴장일을 찾지 못합니다.
//! 과거 휴장일은 설정의 `ingest.holidays`로 등록해야 하며, 등록하지 않은 휴장일은
//! 평일로 처리되어 빈 바 조회로 끝납니다.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use tracing::{info, warn};
use trader_core::Market;
use trader_exchange::{HolidayOracle, HolidayStatus};

/// 시장별 거래일 달력
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    /// 시장 타임존 (날짜 해석 기준)
    time_zone: Tz,
    /// 휴장일 목록 (시장코드:날짜)
    holidays: HashSet<String>,
}

impl MarketCalendar {
    /// 주말만 제외하는 달력.
    pub fn new(time_zone: Tz) -> Self {
        Self {
            time_zone,
            holidays: HashSet::new(),
        }
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// 휴장일 추가
    pub fn add_holiday(&mut self, market: &Market, date: NaiveDate) {
        self.holidays.insert(holiday_key(market, date));
    }

    pub fn with_holidays(
        mut self,
        market: &Market,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        for date in dates {
            self.add_holiday(market, date);
        }
        self
    }

    /// 주말 여부 확인
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 휴장일 여부 확인
    pub fn is_holiday(&self, market: &Market, date: NaiveDate) -> bool {
        self.holidays.contains(&holiday_key(market, date))
    }

    /// 거래일 여부.
    pub fn is_eligible(&self, date: NaiveDate, market: &Market) -> bool {
        !Self::is_weekend(date) && !self.is_holiday(market, date)
    }

    /// 오라클에서 휴장일을 읽어 등록. 등록한 날짜 수를 반환합니다.
    ///
    /// 같은 날짜의 모든 거래소가 종일 휴장일 때만 휴장일로 봅니다.
    /// 조회에 실패하면 경고만 남기고 주말 규칙으로 계속 진행합니다.
    pub async fn load_from_oracle(&mut self, market: &Market, oracle: &dyn HolidayOracle) -> usize {
        let holidays = match oracle.upcoming_holidays().await {
            Ok(h) => h,
            Err(e) => {
                warn!(
                    market = %market,
                    error = %e,
                    "휴장일 조회 실패, 주말 규칙만 적용"
                );
                return 0;
            }
        };

        let mut by_date: BTreeMap<NaiveDate, bool> = BTreeMap::new();
        for holiday in &holidays {
            let closed = holiday.status == HolidayStatus::Closed;
            by_date
                .entry(holiday.date)
                .and_modify(|all_closed| *all_closed &= closed)
                .or_insert(closed);
        }

        let mut added = 0;
        for (date, all_closed) in by_date {
            if all_closed {
                self.add_holiday(market, date);
                added += 1;
            }
        }

        info!(market = %market, added, "휴장일 로드");
        added
    }
}

fn holiday_key(market: &Market, date: NaiveDate) -> String {
    format!("{}:{}", market, date)
}

//! 시장 운영 시간 기반 스케줄러.
//!
//! 데몬 모드에서 장 마감 후 일일 백필 실행 시점을 결정합니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};
use trader_core::Market;

use super::calendar::MarketCalendar;

/// 시장 운영 시간 정보
#[derive(Debug, Clone)]
pub struct MarketHours {
    /// 시장 코드
    pub market: Market,
    /// 시장 타임존
    pub timezone: Tz,
    /// 장 시작 시간 (현지 시간)
    pub open_time: NaiveTime,
    /// 장 마감 시간 (현지 시간)
    pub close_time: NaiveTime,
}

impl MarketHours {
    pub fn new(market: Market, timezone: Tz, open_time: NaiveTime, close_time: NaiveTime) -> Self {
        Self {
            market,
            timezone,
            open_time,
            close_time,
        }
    }
}

/// 시장 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    /// 장중 (거래 시간)
    Open,
    /// 장 마감 (데이터 수집 가능)
    Closed,
    /// 휴장 (주말 또는 공휴일)
    Holiday,
}

/// 시장 기반 스케줄러
pub struct Scheduler {
    hours: MarketHours,
    calendar: Arc<MarketCalendar>,
    /// 장 마감 후 대기 시간
    delay_after_close: Duration,
    /// 마지막 일일 실행 날짜 (현지)
    last_daily_run: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(hours: MarketHours, calendar: Arc<MarketCalendar>, delay_after_close_minutes: u32) -> Self {
        Self {
            hours,
            calendar,
            delay_after_close: Duration::minutes(delay_after_close_minutes as i64),
            last_daily_run: None,
        }
    }

    /// 이전 스케줄러의 마지막 실행 날짜 이어받기 (설정 재로드 후 같은 날 재실행 방지).
    pub fn with_last_daily_run(mut self, date: Option<NaiveDate>) -> Self {
        self.last_daily_run = date;
        self
    }

    pub fn last_daily_run(&self) -> Option<NaiveDate> {
        self.last_daily_run
    }

    /// 일일 실행 가능 시각 (현지, 마감 + 대기).
    fn run_time(&self) -> NaiveTime {
        self.hours.close_time + self.delay_after_close
    }

    /// 시장 상태 조회
    pub fn get_market_status(&self, now: DateTime<Utc>) -> MarketStatus {
        let local_time = now.with_timezone(&self.hours.timezone);
        let local_date = local_time.date_naive();
        let local_naive_time = local_time.time();

        if !self.calendar.is_eligible(local_date, &self.hours.market) {
            return MarketStatus::Holiday;
        }

        if local_naive_time >= self.hours.open_time && local_naive_time < self.hours.close_time {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }

    /// 일일 백필 실행 여부 판단
    ///
    /// 조건:
    /// 1. 거래일
    /// 2. 마감 후 설정된 시간이 경과
    /// 3. 오늘 아직 실행하지 않음
    ///
    /// 조건을 충족하면 실행 날짜를 기록합니다.
    pub fn should_run_daily(&mut self, now: DateTime<Utc>) -> bool {
        let local_time = now.with_timezone(&self.hours.timezone);
        let local_date = local_time.date_naive();

        if !self.calendar.is_eligible(local_date, &self.hours.market) {
            return false;
        }

        if local_time.time() < self.run_time() {
            return false;
        }

        if self.last_daily_run == Some(local_date) {
            debug!(market = %self.hours.market, "오늘 이미 일일 백필 실행함");
            return false;
        }

        self.last_daily_run = Some(local_date);
        info!(
            market = %self.hours.market,
            local_time = %local_time.format("%Y-%m-%d %H:%M:%S"),
            "일일 백필 실행 조건 충족"
        );

        true
    }

    /// 다음 실행 시각까지 남은 시간. 오늘 실행 시각이 지났으면 다음 날 기준입니다.
    pub fn seconds_until_next_run(&self, now: DateTime<Utc>) -> i64 {
        let local_date = now.with_timezone(&self.hours.timezone).date_naive();
        let run_time = self.run_time();

        let mut target_date = local_date;
        loop {
            let target = self
                .hours
                .timezone
                .from_local_datetime(&target_date.and_time(run_time))
                .earliest();
            if let Some(target) = target {
                let diff = target.with_timezone(&Utc) - now;
                if diff > Duration::zero() {
                    return diff.num_seconds();
                }
            }
            match target_date.succ_opt() {
                Some(next) => target_date = next,
                None => return 0,
            }
        }
    }

    /// 스케줄러 상태 요약
    pub fn status_summary(&self, now: DateTime<Utc>) -> String {
        let local_time = now.with_timezone(&self.hours.timezone);
        let lines = [
            "=== 스케줄러 상태 ===".to_string(),
            format!(
                "{}: {:?} (현지시간: {})",
                self.hours.market,
                self.get_market_status(now),
                local_time.format("%Y-%m-%d %H:%M:%S")
            ),
            format!(
                "장 운영: {} ~ {} ({})",
                self.hours.open_time.format("%H:%M"),
                self.hours.close_time.format("%H:%M"),
                self.hours.timezone
            ),
            format!("다음 실행까지: {}초", self.seconds_until_next_run(now)),
        ];

        lines.join("\n")
    }
}

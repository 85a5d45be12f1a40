//! 수집 기간.
//!
//! 날짜는 설정된 타임존의 달력 날짜로 해석됩니다. 하루의 시작은 해당 타임존의
//! 자정이며, DST 전환으로 자정이 두 번 존재하면 앞선 시각을, 자정이 존재하지
//! 않으면 그날의 첫 유효 시각을 사용합니다.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Result, ValidationError};

/// 날짜 문자열 형식
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `begin <= end`가 보장된 포함 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    begin: NaiveDate,
    end: NaiveDate,
    time_zone: Tz,
}

impl DateRange {
    pub fn new(begin: NaiveDate, end: NaiveDate, time_zone: Tz) -> Result<Self> {
        if begin > end {
            return Err(ValidationError::InvertedRange {
                begin: begin.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            begin,
            end,
            time_zone,
        })
    }

    /// 문자열(YYYY-MM-DD, IANA 타임존 이름)에서 생성.
    pub fn parse(begin: &str, end: &str, time_zone: &str) -> Result<Self> {
        let tz: Tz = time_zone
            .trim()
            .parse()
            .map_err(|_| ValidationError::UnknownTimeZone(time_zone.to_string()))?;
        Self::new(parse_date(begin)?, parse_date(end)?, tz)
    }

    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// 기간에 포함된 날짜 수.
    pub fn len_days(&self) -> u64 {
        (self.end - self.begin).num_days() as u64 + 1
    }

    /// 해당 날짜 0시(설정 타임존)의 UTC 시각.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        local_midnight(self.time_zone, date)
    }

    /// 다음 날 0시. 하루 구간은 `[day_start, day_end_exclusive)` 입니다.
    pub fn day_end_exclusive(&self, date: NaiveDate) -> DateTime<Utc> {
        match date.succ_opt() {
            Some(next) => local_midnight(self.time_zone, next),
            None => self.day_start(date) + Duration::days(1),
        }
    }

    /// UTC 시각을 설정 타임존의 달력 날짜로 변환.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.time_zone).date_naive()
    }

    /// `start`부터 `end`까지 오름차순 날짜. `start`가 기간보다 앞서면 `begin`부터.
    pub fn days_from(&self, start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        let first = start.max(self.begin);
        let end = self.end;
        first.iter_days().take_while(move |d| *d <= end)
    }
}

/// YYYY-MM-DD 파싱
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&midnight).earliest() {
        return dt.with_timezone(&Utc);
    }
    // 자정이 DST로 건너뛰어진 경우: 분 단위로 전진해 첫 유효 시각을 찾는다
    (1..=180)
        .filter_map(|m| {
            tz.from_local_datetime(&(midnight + Duration::minutes(m)))
                .earliest()
        })
        .next()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

//! 특정 날짜 기준 종목 메타데이터.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Ticker;

/// 관측일 기준 종목 참조 정보.
///
/// `active`가 false인 날짜는 바를 조회하지 않습니다.
/// 저장소 키는 `(ticker, observation_date)` 입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerMetadata {
    pub ticker: Ticker,
    pub observation_date: NaiveDate,
    pub name: String,
    pub market: Option<String>,
    pub primary_exchange: Option<String>,
    pub active: bool,
    pub currency_name: Option<String>,
    pub locale: Option<String>,
    pub cik: Option<String>,
    pub composite_figi: Option<String>,
    pub share_class_figi: Option<String>,
    pub last_updated_utc: Option<DateTime<Utc>>,
}

impl TickerMetadata {
    /// 필수 필드만으로 생성.
    pub fn new(
        ticker: Ticker,
        observation_date: NaiveDate,
        name: impl Into<String>,
        active: bool,
    ) -> Self {
        Self {
            ticker,
            observation_date,
            name: name.into(),
            market: None,
            primary_exchange: None,
            active,
            currency_name: None,
            locale: None,
            cik: None,
            composite_figi: None,
            share_class_figi: None,
            last_updated_utc: None,
        }
    }
}

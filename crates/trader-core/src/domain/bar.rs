//! OHLCV 바.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Ticker;
use crate::error::{Result, ValidationError};

/// 한 간격 구간의 OHLCV 집계.
///
/// `(ticker, timestamp_millis)`가 저장소의 유일 키입니다.
/// 생성 시 `low <= open, close <= high`와 음수가 아님을 검증합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub ticker: Ticker,
    /// 구간 시작 시각 (UTC epoch ms)
    pub timestamp_millis: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    /// 거래량 가중 평균가 (과거 데이터는 누락될 수 있음)
    pub volume_weighted_price: Option<Decimal>,
    /// 체결 건수
    pub transactions: Option<u64>,
}

impl Bar {
    pub fn builder(ticker: Ticker, timestamp_millis: i64) -> BarBuilder {
        BarBuilder {
            ticker,
            timestamp_millis,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            volume: 0,
            volume_weighted_price: None,
            transactions: None,
        }
    }

    /// 구간 시작 시각.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_millis).single()
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: &str| ValidationError::InvalidBar {
            timestamp_millis: self.timestamp_millis,
            reason: reason.to_string(),
        };

        if [self.open, self.high, self.low, self.close]
            .iter()
            .any(|p| p.is_sign_negative())
        {
            return Err(fail("음수 가격"));
        }
        if self.low > self.high {
            return Err(fail("low > high"));
        }
        if self.open < self.low || self.open > self.high {
            return Err(fail("open이 [low, high] 범위 밖"));
        }
        if self.close < self.low || self.close > self.high {
            return Err(fail("close가 [low, high] 범위 밖"));
        }
        if self.volume_weighted_price.is_some_and(|v| v.is_sign_negative()) {
            return Err(fail("음수 VWAP"));
        }
        Ok(())
    }
}

/// [`Bar`] 빌더. `build()`에서 검증합니다.
#[derive(Debug, Clone)]
pub struct BarBuilder {
    ticker: Ticker,
    timestamp_millis: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: u64,
    volume_weighted_price: Option<Decimal>,
    transactions: Option<u64>,
}

impl BarBuilder {
    pub fn ohlc(mut self, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        self.open = open;
        self.high = high;
        self.low = low;
        self.close = close;
        self
    }

    pub fn volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }

    pub fn volume_weighted_price(mut self, vwap: Option<Decimal>) -> Self {
        self.volume_weighted_price = vwap;
        self
    }

    pub fn transactions(mut self, transactions: Option<u64>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn build(self) -> Result<Bar> {
        let bar = Bar {
            ticker: self.ticker,
            timestamp_millis: self.timestamp_millis,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            volume_weighted_price: self.volume_weighted_price,
            transactions: self.transactions,
        };
        bar.validate()?;
        Ok(bar)
    }
}

//! 시세 데이터 프로바이더 trait과 구현체.
//!
//! # Provider 구조
//!
//! - [`MarketDataProvider`]: 종목 메타데이터와 바 조회. 페이지네이션 커서는
//!   구현체 내부에서 모두 소비하며 호출자에게 노출하지 않습니다.
//! - [`HolidayOracle`]: 거래소 휴장일 조회 (선택)
//! - [`PolygonProvider`]: Polygon.io REST API 구현

mod polygon;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use trader_core::{Bar, Granularity, Ticker, TickerMetadata};

use crate::error::ProviderError;

pub use polygon::{PolygonConfig, PolygonProvider, DEFAULT_BASE_URL};

/// 바 스트림.
///
/// 유한하며 타임스탬프 내림차순입니다. 마지막 페이지까지 소비했거나
/// 에러를 한 번 내보낸 뒤에만 종료됩니다.
pub type BarStream<'a> = BoxStream<'a, Result<Bar, ProviderError>>;

/// 바 조회 요청. 구간은 `[from, to]` 양 끝 포함입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsRequest {
    pub ticker: Ticker,
    pub granularity: Granularity,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// 시세 데이터 프로바이더.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 프로바이더 이름 (로그용)
    fn name(&self) -> &str;

    /// 특정 날짜 기준 종목 메타데이터 조회.
    ///
    /// # Errors
    ///
    /// - `ProviderError::NotFound`: 해당 날짜에 종목 정보 없음
    /// - `ProviderError::RateLimited`: 요청 한도 초과
    /// - `ProviderError::Transient`: 네트워크/서버 오류
    async fn fetch_ticker_metadata(
        &self,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<TickerMetadata, ProviderError>;

    /// 구간 내 바 조회.
    ///
    /// 페이지 요청은 스트림을 소비하는 시점에 지연 실행됩니다.
    fn fetch_bars<'a>(&'a self, request: &BarsRequest) -> BarStream<'a>;
}

/// 휴장일 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HolidayStatus {
    /// 종일 휴장
    Closed,
    /// 조기 폐장 (거래일)
    EarlyClose,
}

/// 거래소 휴장일.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHoliday {
    pub exchange: String,
    pub name: String,
    pub date: NaiveDate,
    pub status: HolidayStatus,
}

/// 휴장일 조회 (시장 상태 오라클).
#[async_trait]
pub trait HolidayOracle: Send + Sync {
    /// 예정된 휴장일 목록.
    async fn upcoming_holidays(&self) -> Result<Vec<MarketHoliday>, ProviderError>;
}

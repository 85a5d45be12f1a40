//! 시세 데이터 프로바이더 게이트웨이.
//!
//! - [`MarketDataProvider`]: 종목 메타데이터/바 조회 추상화 (페이지네이션 내부 처리)
//! - [`PolygonProvider`]: Polygon.io REST 구현
//! - [`retry`]: 지수 백오프 재시도
//! - [`throttle`]: 수집기 전체가 공유하는 요청 예산과 Rate Limit 백오프

pub mod error;
pub mod provider;
pub mod retry;
pub mod throttle;

pub use error::ProviderError;
pub use provider::{
    BarStream, BarsRequest, HolidayOracle, HolidayStatus, MarketDataProvider, MarketHoliday,
    PolygonConfig, PolygonProvider,
};
pub use retry::{with_retry, RetryConfig, RetryError};
pub use throttle::RequestBudget;

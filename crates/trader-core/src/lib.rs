//! 백필 엔진 공통 도메인 타입.
//!
//! 시장/종목 식별자, 수집 기간과 타임존, 바 간격, OHLCV 바,
//! 종목 메타데이터, 진행 상황(체크포인트)을 정의합니다.
//! 모든 타입은 생성 시점에 불변 조건을 검증합니다.

pub mod domain;
pub mod error;

pub use domain::{
    Bar, BarBuilder, DateRange, Granularity, Market, Progress, Ticker, TickerMetadata,
    TimespanUnit,
};
pub use error::{Result, ValidationError};

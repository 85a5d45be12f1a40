//! 저장소 trait과 구현.
//!
//! 두 trait 모두 여러 종목 수집기가 동시에 호출합니다. 서로 다른 키에 대한
//! 쓰기는 간섭하지 않아야 하며, 같은 키에 대한 쓰기는 마지막 값이 남습니다.

mod bars;
mod memory;
mod progress;

use async_trait::async_trait;
use trader_core::{Bar, Market, Progress, Ticker, TickerMetadata};

use crate::error::Result;

pub use bars::PgBarRepository;
pub use memory::{MemoryBarRepository, MemoryProgressStore};
pub use progress::PgProgressStore;

/// 종목별 체크포인트 저장소.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// 체크포인트 조회. 없으면 `None`.
    async fn get(&self, market: &Market, ticker: &Ticker) -> Result<Option<Progress>>;

    /// 체크포인트 기록.
    ///
    /// 반환 시점에 내구성이 보장되어야 합니다. 기존 값보다 이전 시각은
    /// 무시되어 `last_processed`는 줄어들지 않습니다.
    async fn set(&self, progress: &Progress) -> Result<()>;

    /// 체크포인트 목록 (운영 CLI용).
    async fn list(&self, market: Option<&Market>) -> Result<Vec<Progress>>;

    /// 체크포인트 삭제 (운영 CLI용). 삭제했으면 true.
    async fn clear(&self, market: &Market, ticker: &Ticker) -> Result<bool>;
}

/// 바/메타데이터 저장소. 모든 쓰기는 키 기준 upsert 입니다.
#[async_trait]
pub trait BarRepository: Send + Sync {
    /// `(ticker, timestamp_millis)` 기준 upsert.
    async fn write_bar(&self, bar: &Bar) -> Result<()>;

    /// 여러 바 저장. 저장된 바 수를 반환합니다.
    async fn write_bars(&self, bars: &[Bar]) -> Result<usize> {
        for bar in bars {
            self.write_bar(bar).await?;
        }
        Ok(bars.len())
    }

    /// `(ticker, observation_date)` 기준 upsert.
    async fn write_ticker_metadata(&self, metadata: &TickerMetadata) -> Result<()>;
}

//! 인메모리 저장소.
//!
//! DB 없이 엔진을 실행하거나 테스트할 때 사용합니다. 프로세스 종료 시
//! 내용이 사라지지만, 동작 의미(upsert, 단조 체크포인트)는 PostgreSQL
//! 구현과 같습니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use trader_core::{Bar, Market, Progress, Ticker, TickerMetadata};

use super::{BarRepository, ProgressStore};
use crate::error::Result;

/// 인메모리 [`ProgressStore`].
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    entries: RwLock<BTreeMap<(Market, Ticker), Progress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다른 저장소의 체크포인트를 복사한 저장소.
    ///
    /// 원본에는 쓰지 않으므로 dry-run처럼 결과를 버리는 실행에서 이어받기 위치만
    /// 가져올 때 사용합니다.
    pub async fn snapshot_of(
        source: &dyn ProgressStore,
        market: &Market,
        tickers: &[Ticker],
    ) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for ticker in tickers {
            if let Some(progress) = source.get(market, ticker).await? {
                entries.insert((market.clone(), ticker.clone()), progress);
            }
        }
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get(&self, market: &Market, ticker: &Ticker) -> Result<Option<Progress>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(market.clone(), ticker.clone())).cloned())
    }

    async fn set(&self, progress: &Progress) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry((progress.market.clone(), progress.ticker.clone()))
            .and_modify(|existing| {
                if progress.last_processed > existing.last_processed {
                    existing.last_processed = progress.last_processed;
                }
            })
            .or_insert_with(|| progress.clone());
        Ok(())
    }

    async fn list(&self, market: Option<&Market>) -> Result<Vec<Progress>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|p| market.map_or(true, |m| &p.market == m))
            .cloned()
            .collect())
    }

    async fn clear(&self, market: &Market, ticker: &Ticker) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(&(market.clone(), ticker.clone())).is_some())
    }
}

/// 인메모리 [`BarRepository`].
#[derive(Debug, Default)]
pub struct MemoryBarRepository {
    bars: RwLock<BTreeMap<(Ticker, i64), Bar>>,
    metadata: RwLock<BTreeMap<(Ticker, NaiveDate), TickerMetadata>>,
    bar_writes: AtomicUsize,
}

impl MemoryBarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 종목의 바 (타임스탬프 오름차순).
    pub async fn bars_for(&self, ticker: &Ticker) -> Vec<Bar> {
        let bars = self.bars.read().await;
        bars.range((ticker.clone(), i64::MIN)..=(ticker.clone(), i64::MAX))
            .map(|(_, bar)| bar.clone())
            .collect()
    }

    /// 저장된 전체 바 수 (중복 제거 후).
    pub async fn bar_count(&self) -> usize {
        self.bars.read().await.len()
    }

    /// 종목의 메타데이터 이력 (날짜 오름차순).
    pub async fn metadata_for(&self, ticker: &Ticker) -> Vec<TickerMetadata> {
        let metadata = self.metadata.read().await;
        metadata
            .iter()
            .filter(|((t, _), _)| t == ticker)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// `write_bar` 호출 누적 횟수 (덮어쓰기 포함).
    pub fn bar_writes(&self) -> usize {
        self.bar_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BarRepository for MemoryBarRepository {
    async fn write_bar(&self, bar: &Bar) -> Result<()> {
        let mut bars = self.bars.write().await;
        bars.insert((bar.ticker.clone(), bar.timestamp_millis), bar.clone());
        self.bar_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write_ticker_metadata(&self, metadata: &TickerMetadata) -> Result<()> {
        let mut entries = self.metadata.write().await;
        entries.insert(
            (metadata.ticker.clone(), metadata.observation_date),
            metadata.clone(),
        );
        Ok(())
    }
}

//! PostgreSQL 체크포인트 저장소.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, instrument};
use trader_core::{Market, Progress, Ticker};

use super::ProgressStore;
use crate::error::{DataError, Result};

/// `backfill_progress` 레코드.
#[derive(Debug, Clone, FromRow)]
struct ProgressRecord {
    market: String,
    ticker: String,
    last_processed: DateTime<Utc>,
}

impl ProgressRecord {
    fn into_progress(self) -> Result<Progress> {
        let market = Market::new(&self.market)
            .map_err(|e| DataError::ConversionError(e.to_string()))?;
        let ticker = Ticker::new(&self.ticker)
            .map_err(|e| DataError::ConversionError(e.to_string()))?;
        Ok(Progress::new(market, ticker, self.last_processed))
    }
}

/// `backfill_progress` 테이블 기반 [`ProgressStore`].
#[derive(Debug, Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    #[instrument(skip(self))]
    async fn get(&self, market: &Market, ticker: &Ticker) -> Result<Option<Progress>> {
        let record: Option<ProgressRecord> = sqlx::query_as(
            r#"
            SELECT market, ticker, last_processed
            FROM backfill_progress
            WHERE market = $1 AND ticker = $2
            "#,
        )
        .bind(market.as_str())
        .bind(ticker.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        record.map(ProgressRecord::into_progress).transpose()
    }

    #[instrument(skip(self, progress), fields(market = %progress.market, ticker = %progress.ticker))]
    async fn set(&self, progress: &Progress) -> Result<()> {
        // GREATEST: 이전 시각으로 되돌리지 않음
        sqlx::query(
            r#"
            INSERT INTO backfill_progress (market, ticker, last_processed, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (market, ticker) DO UPDATE SET
                last_processed = GREATEST(backfill_progress.last_processed, EXCLUDED.last_processed),
                updated_at = NOW()
            "#,
        )
        .bind(progress.market.as_str())
        .bind(progress.ticker.as_str())
        .bind(progress.last_processed)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        debug!(last_processed = %progress.last_processed, "체크포인트 저장");
        Ok(())
    }

    async fn list(&self, market: Option<&Market>) -> Result<Vec<Progress>> {
        let records: Vec<ProgressRecord> = sqlx::query_as(
            r#"
            SELECT market, ticker, last_processed
            FROM backfill_progress
            WHERE ($1::text IS NULL OR market = $1)
            ORDER BY market, ticker
            "#,
        )
        .bind(market.map(|m| m.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        records
            .into_iter()
            .map(ProgressRecord::into_progress)
            .collect()
    }

    async fn clear(&self, market: &Market, ticker: &Ticker) -> Result<bool> {
        let result = sqlx::query("DELETE FROM backfill_progress WHERE market = $1 AND ticker = $2")
            .bind(market.as_str())
            .bind(ticker.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

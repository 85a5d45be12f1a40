//! PostgreSQL 바/메타데이터 저장소.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{debug, instrument};
use trader_core::{Bar, TickerMetadata};

use super::BarRepository;
use crate::error::{DataError, Result};

/// 한 번에 저장하는 최대 바 수
const CHUNK_SIZE: usize = 500;

/// `stock_bars` / `stock_tickers_history` 테이블 기반 [`BarRepository`].
///
/// 바마다 UTC 시각(`bar_time`)과 함께 시장 시간대의 현지 시각(`trade_date`)을 기록합니다.
#[derive(Debug, Clone)]
pub struct PgBarRepository {
    pool: PgPool,
    time_zone: Tz,
}

impl PgBarRepository {
    pub fn new(pool: PgPool, time_zone: Tz) -> Self {
        Self { pool, time_zone }
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| DataError::ConversionError(format!("{field} 범위 초과: {value}")))
}

fn bar_time(bar: &Bar) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(bar.timestamp_millis)
        .single()
        .ok_or_else(|| {
            DataError::ConversionError(format!("잘못된 타임스탬프: {}", bar.timestamp_millis))
        })
}

fn trade_time(bar_time: DateTime<Utc>, time_zone: Tz) -> NaiveDateTime {
    bar_time.with_timezone(&time_zone).naive_local()
}

#[async_trait]
impl BarRepository for PgBarRepository {
    async fn write_bar(&self, bar: &Bar) -> Result<()> {
        self.write_bars(std::slice::from_ref(bar)).await.map(|_| ())
    }

    /// UNNEST 패턴으로 청크 단위 일괄 upsert.
    ///
    /// 같은 청크 안에 중복 키가 있으면 PostgreSQL이 거부하므로
    /// 호출자는 타임스탬프 기준 중복을 제거해서 넘겨야 합니다.
    #[instrument(skip(self, bars), fields(count = bars.len()))]
    async fn write_bars(&self, bars: &[Bar]) -> Result<usize> {
        let mut written = 0;

        for chunk in bars.chunks(CHUNK_SIZE) {
            let tickers: Vec<&str> = chunk.iter().map(|b| b.ticker.as_str()).collect();
            let timestamps: Vec<i64> = chunk.iter().map(|b| b.timestamp_millis).collect();
            let bar_times = chunk.iter().map(bar_time).collect::<Result<Vec<_>>>()?;
            let trade_times: Vec<NaiveDateTime> = bar_times
                .iter()
                .map(|t| trade_time(*t, self.time_zone))
                .collect();
            let opens: Vec<Decimal> = chunk.iter().map(|b| b.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|b| b.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|b| b.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|b| b.close).collect();
            let volumes = chunk
                .iter()
                .map(|b| to_i64(b.volume, "volume"))
                .collect::<Result<Vec<_>>>()?;
            let vwaps: Vec<Option<Decimal>> =
                chunk.iter().map(|b| b.volume_weighted_price).collect();
            let transactions = chunk
                .iter()
                .map(|b| b.transactions.map(|t| to_i64(t, "transactions")).transpose())
                .collect::<Result<Vec<_>>>()?;

            let result = sqlx::query(
                r#"
                INSERT INTO stock_bars
                    (ticker, timestamp_millis, bar_time, trade_date, open, high, low, close,
                     volume, volume_weighted_price, transactions, fetched_at)
                SELECT *, NOW() FROM UNNEST(
                    $1::text[], $2::bigint[], $3::timestamptz[], $4::timestamp[],
                    $5::numeric[], $6::numeric[], $7::numeric[], $8::numeric[],
                    $9::bigint[], $10::numeric[], $11::bigint[]
                )
                ON CONFLICT (ticker, timestamp_millis) DO UPDATE SET
                    bar_time = EXCLUDED.bar_time,
                    trade_date = EXCLUDED.trade_date,
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    volume_weighted_price = EXCLUDED.volume_weighted_price,
                    transactions = EXCLUDED.transactions,
                    fetched_at = NOW()
                "#,
            )
            .bind(&tickers)
            .bind(&timestamps)
            .bind(&bar_times)
            .bind(&trade_times)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&volumes)
            .bind(&vwaps)
            .bind(&transactions)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            written += result.rows_affected() as usize;
        }

        debug!(written, "바 저장");
        Ok(written)
    }

    #[instrument(skip(self, metadata), fields(ticker = %metadata.ticker, date = %metadata.observation_date))]
    async fn write_ticker_metadata(&self, metadata: &TickerMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_tickers_history
                (ticker, observation_date, name, market, primary_exchange, active,
                 currency_name, locale, cik, composite_figi, share_class_figi,
                 last_updated_utc, fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (ticker, observation_date) DO UPDATE SET
                name = EXCLUDED.name,
                market = EXCLUDED.market,
                primary_exchange = EXCLUDED.primary_exchange,
                active = EXCLUDED.active,
                currency_name = EXCLUDED.currency_name,
                locale = EXCLUDED.locale,
                cik = EXCLUDED.cik,
                composite_figi = EXCLUDED.composite_figi,
                share_class_figi = EXCLUDED.share_class_figi,
                last_updated_utc = EXCLUDED.last_updated_utc,
                fetched_at = NOW()
            "#,
        )
        .bind(metadata.ticker.as_str())
        .bind(metadata.observation_date)
        .bind(&metadata.name)
        .bind(&metadata.market)
        .bind(&metadata.primary_exchange)
        .bind(metadata.active)
        .bind(&metadata.currency_name)
        .bind(&metadata.locale)
        .bind(&metadata.cik)
        .bind(&metadata.composite_figi)
        .bind(&metadata.share_class_figi)
        .bind(metadata.last_updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::InsertError(e.to_string()))?;

        Ok(())
    }
}

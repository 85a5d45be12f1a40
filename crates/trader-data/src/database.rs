//! PostgreSQL 연결 풀.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::{DataError, Result};

const SCHEMA_SQL: &str = include_str!("../migrations/0001_backfill.sql");

/// 연결 풀 설정
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// 동시 수집 종목 수에 맞춘 풀 크기 (종목당 1 + 여유 2).
    pub fn for_concurrency(url: impl Into<String>, concurrency: usize) -> Self {
        Self {
            max_connections: (concurrency as u32).saturating_add(2),
            ..Self::new(url)
        }
    }
}

/// 연결 풀 래퍼.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "데이터베이스 연결 풀 생성"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 백필 테이블 생성 (이미 있으면 무시).
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;
        info!("백필 스키마 확인 완료");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//! 백필 엔진 저장소 계층.
//!
//! - [`ProgressStore`]: 종목별 체크포인트 (단조 증가)
//! - [`BarRepository`]: 바/메타데이터 멱등 저장 (upsert)
//!
//! PostgreSQL 구현과 테스트용 인메모리 구현을 제공합니다.

pub mod database;
pub mod error;
pub mod storage;

pub use database::{Database, DatabaseConfig};
pub use error::{DataError, Result};
pub use storage::{
    BarRepository, MemoryBarRepository, MemoryProgressStore, PgBarRepository, PgProgressStore,
    ProgressStore,
};

//! 에러 타입 정의.

use thiserror::Error;
use trader_core::ValidationError;
use trader_data::DataError;
use trader_exchange::{ProviderError, RetryError};

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 도메인 값 검증 실패
    #[error("검증 에러: {0}")]
    Validation(#[from] ValidationError),

    /// 저장소 에러 (재시도하지 않음)
    #[error("저장소 에러: {0}")]
    Storage(#[from] DataError),

    /// 프로바이더 에러 (재시도 소진 또는 재시도 불가)
    #[error("프로바이더 에러: {0}")]
    Provider(#[from] ProviderError),

    /// 취소됨
    #[error("작업 취소됨")]
    Cancelled,
}

impl From<RetryError> for CollectorError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Provider(e) => Self::Provider(e),
            RetryError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

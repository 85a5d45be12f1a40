//! 저장소 에러.

use thiserror::Error;

/// 저장소 에러. 엔진은 이 에러를 재시도하지 않습니다.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("DB 연결 실패: {0}")]
    ConnectionError(String),

    #[error("조회 실패: {0}")]
    QueryError(String),

    #[error("저장 실패: {0}")]
    InsertError(String),

    #[error("스키마 적용 실패: {0}")]
    MigrationError(String),

    #[error("값 변환 실패: {0}")]
    ConversionError(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, DataError>;

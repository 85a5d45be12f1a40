//! 도메인 검증 에러.

use thiserror::Error;

/// 도메인 값 생성/파싱 실패.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 빈 식별자
    #[error("{kind} 식별자가 비어 있습니다")]
    EmptyIdentifier { kind: &'static str },

    /// 허용되지 않는 문자
    #[error("{kind} 식별자에 허용되지 않는 문자가 있습니다: {value}")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// 시작일이 종료일보다 늦음
    #[error("기간이 잘못되었습니다: begin={begin} > end={end}")]
    InvertedRange { begin: String, end: String },

    /// 날짜 파싱 실패
    #[error("날짜 형식 오류 (YYYY-MM-DD): {0}")]
    InvalidDate(String),

    /// 알 수 없는 타임존
    #[error("알 수 없는 타임존: {0}")]
    UnknownTimeZone(String),

    /// 알 수 없는 간격 단위
    #[error("알 수 없는 간격 단위: {0} (minute|hour|day|week|month)")]
    UnknownTimespan(String),

    /// 간격 배수가 0
    #[error("간격 배수는 1 이상이어야 합니다")]
    ZeroMultiplier,

    /// OHLC 가격 관계 위반
    #[error("OHLC 불변 조건 위반 (ts={timestamp_millis}): {reason}")]
    InvalidBar { timestamp_millis: i64, reason: String },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, ValidationError>;

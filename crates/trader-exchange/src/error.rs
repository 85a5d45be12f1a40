//! 프로바이더 에러 분류.

use std::time::Duration;

use thiserror::Error;

/// 프로바이더 호출 에러.
///
/// `Transient`와 `RateLimited`만 재시도 대상입니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// 요청한 종목/날짜 데이터 없음
    #[error("데이터 없음: {0}")]
    NotFound(String),

    /// 요청 한도 초과. `retry_after` 이전에는 재요청하지 않습니다.
    #[error("Rate limit 초과 ({}ms 후 재시도)", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    /// 네트워크/서버 측 일시 오류
    #[error("일시적 오류: {0}")]
    Transient(String),

    /// 잘못된 요청 (인증 실패 포함)
    #[error("잘못된 요청: {0}")]
    InvalidRequest(String),

    /// 응답 파싱 실패 또는 바 불변 조건 위반
    #[error("응답 형식 오류: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// 재시도 가능 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// 프로바이더가 지정한 최소 대기 시간.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

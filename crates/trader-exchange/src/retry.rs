//! 프로바이더 호출 재시도 유틸리티.
//!
//! 네트워크 오류, Rate Limit 등 일시적인 오류에 대해 자동 재시도를 수행합니다.
//! 매 시도 전에 공유 [`RequestBudget`]을 기다리며, `RateLimited` 응답은 예산 전체를
//! 멈춰 다른 수집기도 함께 대기하게 합니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_exchange::retry::{with_retry, RetryConfig};
//!
//! let metadata = with_retry(&RetryConfig::default(), &budget, &cancel, || {
//!     provider.fetch_ticker_metadata(&ticker, date)
//! })
//! .await?;
//! ```

use std::{future::Future, time::Duration};

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::throttle::RequestBudget;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 기본 대기 시간.
    pub base_delay: Duration,
    /// 백오프 상한. 프로바이더가 지정한 `retry_after`는 이 값을 넘어도 지킵니다.
    pub max_delay: Duration,
    /// 지수 백오프 사용 여부.
    pub use_exponential_backoff: bool,
    /// 백오프 배수 (지수 백오프 시 사용).
    pub backoff_multiplier: f64,
    /// 재시도 시 지터(무작위 지연) 추가 여부.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            use_exponential_backoff: true,
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 대기 시간 계산.
    fn calculate_delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        let delay = if self.use_exponential_backoff && attempt > 0 {
            let multiplier = self.backoff_multiplier.powi(attempt as i32);
            Duration::from_secs_f64(self.base_delay.as_secs_f64() * multiplier)
        } else {
            self.base_delay
        };

        let delay = delay.min(self.max_delay);

        // 지터 (±25%)
        let delay = if self.add_jitter {
            let jitter_range = delay.as_secs_f64() * 0.25;
            let jitter = rand::thread_rng().gen_range(-1.0..=1.0) * jitter_range;
            Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
        } else {
            delay
        };

        // 프로바이더가 지정한 대기 시간보다 먼저 재요청하지 않음
        match error.retry_after() {
            Some(retry_after) => delay.max(retry_after),
            None => delay,
        }
    }
}

/// 재시도 실패.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// 재시도 불가 에러이거나 재시도 횟수 초과
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 대기 중 취소됨
    #[error("재시도 대기 중 취소됨")]
    Cancelled,
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// # Arguments
/// * `config` - 재시도 설정
/// * `budget` - 공유 요청 예산 (매 시도 전 대기, Rate Limit 시 일시 중지)
/// * `cancel` - 대기 중 취소 신호 (호출자는 진행 중인 작업을 포기해도 될 때만 취소)
/// * `operation` - 실행할 비동기 작업
///
/// # Returns
/// * `Ok(T)` - 작업 성공 결과
/// * `Err(RetryError::Provider)` - 재시도 불가 에러 또는 모든 재시도 실패 후 마지막 에러
/// * `Err(RetryError::Cancelled)` - 대기 중 취소
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    budget: &RequestBudget,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        // 예산을 바로 얻을 수 있으면 취소 여부와 관계없이 요청을 보냄
        tokio::select! {
            biased;
            _ = budget.acquire() => {}
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        attempts = attempt + 1,
                        total_delay_ms = total_delay.as_millis() as u64,
                        "재시도 후 성공"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if let Some(retry_after) = e.retry_after() {
                    budget.penalize(retry_after);
                }

                // 재시도 가능한 에러가 아니면 즉시 실패
                if !e.is_retryable() {
                    debug!(error = %e, "재시도 불가능한 에러, 즉시 실패 반환");
                    return Err(e.into());
                }

                // 최대 재시도 횟수 초과
                if attempt >= config.max_retries {
                    warn!(
                        error = %e,
                        attempts = attempt + 1,
                        max_retries = config.max_retries,
                        "최대 재시도 횟수 초과"
                    );
                    return Err(e.into());
                }

                let delay = config.calculate_delay(attempt, &e);
                total_delay += delay;

                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "재시도 대기 중"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
                attempt += 1;
            }
        }
    }
}

//! 수집기 전체가 공유하는 요청 예산.
//!
//! 모든 프로바이더 호출은 먼저 [`RequestBudget::acquire`]를 기다립니다.
//! 한 수집기가 `RateLimited`를 받으면 [`RequestBudget::penalize`]로 예산 전체를
//! 멈춰 다른 수집기도 같은 시각까지 요청하지 않습니다.

use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::time::Instant;
use tracing::{debug, warn};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// 토큰 버킷 + 공유 백오프.
pub struct RequestBudget {
    limiter: Option<DirectRateLimiter>,
    paused_until: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("limited", &self.limiter.is_some())
            .field("pause_remaining", &self.pause_remaining())
            .finish()
    }
}

impl RequestBudget {
    /// 분당 요청 수 제한. 0이면 제한 없음.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|n| RateLimiter::direct(Quota::per_minute(n)));
        Self {
            limiter,
            paused_until: Mutex::new(None),
        }
    }

    /// 제한 없음 (Rate Limit 백오프만 적용).
    pub fn unlimited() -> Self {
        Self::per_minute(0)
    }

    /// 요청 가능할 때까지 대기.
    pub async fn acquire(&self) {
        loop {
            let remaining = self.pause_remaining();
            if remaining.is_zero() {
                break;
            }
            debug!(wait_ms = remaining.as_millis() as u64, "공유 백오프 대기");
            tokio::time::sleep(remaining).await;
        }

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// `retry_after` 동안 모든 요청을 멈춤. 이미 더 긴 백오프 중이면 유지.
    pub fn penalize(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut paused = self
            .paused_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if paused.map_or(true, |current| until > current) {
            *paused = Some(until);
            warn!(
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit 감지, 전체 요청 일시 중지"
            );
        }
    }

    /// 남은 공유 백오프 시간.
    pub fn pause_remaining(&self) -> Duration {
        let paused = self
            .paused_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        paused
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_penalize_blocks_acquire() {
        let budget = RequestBudget::unlimited();
        budget.penalize(Duration::from_secs(5));

        let start = Instant::now();
        budget.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(budget.pause_remaining().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_penalty_does_not_shrink_pause() {
        let budget = RequestBudget::unlimited();
        budget.penalize(Duration::from_secs(10));
        budget.penalize(Duration::from_secs(1));

        assert!(budget.pause_remaining() > Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_acquire_without_pause_is_immediate() {
        let budget = RequestBudget::per_minute(600);
        budget.acquire().await;
        assert!(budget.pause_remaining().is_zero());
    }
}

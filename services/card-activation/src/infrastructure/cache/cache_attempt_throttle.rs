//! 基于共享缓存（Redis）的失败计数，多实例共享锁定状态

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cardgate_ports::{CachePort, CounterOutcome};
use tracing::warn;

use crate::domain::services::{Admission, AttemptThrottle, ThrottlePolicy, ThrottleStatus};

/// 失败计数的存活时间，超过后未触发锁定的计数自然清零
const FAILURE_WINDOW_SECS: u64 = 24 * 60 * 60;

/// 缓存节流器
///
/// - 计数键 `card_throttle_fail:{key}`
/// - 锁定键 `card_throttle_lock:{key}`，过期即解锁
///
/// 锁定检查与计数由 `CachePort::incr_with_lockout` 一次完成。
/// 缓存不可用时放行并记录告警。
pub struct CacheAttemptThrottle {
    cache: Arc<dyn CachePort>,
    policy: ThrottlePolicy,
}

impl CacheAttemptThrottle {
    pub fn new(cache: Arc<dyn CachePort>, policy: ThrottlePolicy) -> Self {
        Self { cache, policy }
    }

    fn fail_key(key: &str) -> String {
        format!("card_throttle_fail:{}", key)
    }

    fn lock_key(key: &str) -> String {
        format!("card_throttle_lock:{}", key)
    }

    fn lockout(&self) -> Duration {
        Duration::from_secs(self.policy.lockout.num_seconds().max(1) as u64)
    }
}

#[async_trait]
impl AttemptThrottle for CacheAttemptThrottle {
    async fn check_allowed(&self, key: &str) -> ThrottleStatus {
        match self.cache.ttl(&Self::lock_key(key)).await {
            Ok(Some(secs)) if secs > 0 => ThrottleStatus::LockedOut {
                retry_after: chrono::Duration::seconds(secs),
            },
            Ok(_) => ThrottleStatus::Allowed,
            Err(e) => {
                warn!(error = %e, "Throttle cache unavailable, allowing attempt");
                ThrottleStatus::Allowed
            }
        }
    }

    async fn try_acquire(&self, key: &str) -> Admission {
        let outcome = self
            .cache
            .incr_with_lockout(
                &Self::fail_key(key),
                &Self::lock_key(key),
                u64::from(self.policy.max_failed_attempts),
                Duration::from_secs(FAILURE_WINDOW_SECS),
                self.lockout(),
            )
            .await;

        match outcome {
            Ok(CounterOutcome::Counted(n)) => Admission::Admitted {
                attempts: u32::try_from(n).unwrap_or(u32::MAX),
            },
            Ok(CounterOutcome::LimitReached) => Admission::FinalAttempt,
            Ok(CounterOutcome::Locked { ttl_secs }) => Admission::LockedOut {
                retry_after: chrono::Duration::seconds(ttl_secs),
            },
            Err(e) => {
                warn!(error = %e, "Failed to record attempt, allowing it");
                Admission::Unrecorded
            }
        }
    }

    async fn record_success(&self, key: &str) {
        for k in [Self::fail_key(key), Self::lock_key(key)] {
            if let Err(e) = self.cache.delete(&k).await {
                warn!(error = %e, "Failed to clear throttle state");
            }
        }
    }
}

//! 进程内失败计数
//!
//! 仅对单实例部署有效：多实例之间不共享计数，攻击者可以轮换实例绕过锁定。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cardgate_common::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::services::{Admission, AttemptThrottle, ThrottlePolicy, ThrottleStatus};

#[derive(Debug, Default, Clone, Copy)]
struct ThrottleEntry {
    failures: u32,
    locked_until: Option<DateTime<Utc>>,
}

impl ThrottleEntry {
    fn lock_remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.locked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}

/// 内存节流器
///
/// 每次调用在同一把锁内完成读与改。
pub struct InMemoryAttemptThrottle {
    entries: Mutex<HashMap<String, ThrottleEntry>>,
    policy: ThrottlePolicy,
    clock: Arc<dyn Clock>,
}

impl InMemoryAttemptThrottle {
    pub fn new(policy: ThrottlePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
            clock,
        }
    }

    /// 当前跟踪的 key 数量
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl AttemptThrottle for InMemoryAttemptThrottle {
    async fn check_allowed(&self, key: &str) -> ThrottleStatus {
        let now = self.clock.now();
        let entries = self.entries.lock();

        match entries.get(key).and_then(|e| e.lock_remaining(now)) {
            Some(retry_after) => ThrottleStatus::LockedOut { retry_after },
            None => ThrottleStatus::Allowed,
        }
    }

    async fn try_acquire(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_default();

        if let Some(retry_after) = entry.lock_remaining(now) {
            return Admission::LockedOut { retry_after };
        }
        entry.locked_until = None;

        entry.failures += 1;
        if entry.failures >= self.policy.max_failed_attempts {
            entry.failures = 0;
            entry.locked_until = Some(now + self.policy.lockout);
            return Admission::FinalAttempt;
        }

        Admission::Admitted {
            attempts: entry.failures,
        }
    }

    async fn record_success(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardgate_common::ManualClock;
    use chrono::Duration;

    fn throttle() -> (InMemoryAttemptThrottle, ManualClock) {
        let clock = ManualClock::starting_now();
        let throttle =
            InMemoryAttemptThrottle::new(ThrottlePolicy::default(), Arc::new(clock.clone()));
        (throttle, clock)
    }

    #[tokio::test]
    async fn test_fifth_attempt_engages_lockout() {
        let (throttle, clock) = throttle();

        for i in 1..5 {
            assert_eq!(
                throttle.try_acquire("tok").await,
                Admission::Admitted { attempts: i }
            );
            assert!(throttle.check_allowed("tok").await.is_allowed());
        }
        assert_eq!(throttle.try_acquire("tok").await, Admission::FinalAttempt);

        let status = throttle.check_allowed("tok").await;
        assert!(!status.is_allowed());
        assert_eq!(status.retry_after_secs(), 15 * 60);
        assert_eq!(throttle.try_acquire("tok").await.retry_after_secs(), 15 * 60);

        clock.advance(Duration::minutes(15) - Duration::seconds(1));
        assert!(!throttle.check_allowed("tok").await.is_allowed());

        clock.advance(Duration::seconds(1));
        assert!(throttle.check_allowed("tok").await.is_allowed());
    }

    #[tokio::test]
    async fn test_attempts_during_lockout_do_not_extend_it() {
        let (throttle, clock) = throttle();
        for _ in 0..5 {
            throttle.try_acquire("tok").await;
        }

        clock.advance(Duration::minutes(10));
        assert!(!throttle.try_acquire("tok").await.is_admitted());

        clock.advance(Duration::minutes(5));
        assert!(throttle.check_allowed("tok").await.is_allowed());
        // 锁定结束后重新从 1 计数
        assert_eq!(
            throttle.try_acquire("tok").await,
            Admission::Admitted { attempts: 1 }
        );
    }

    #[tokio::test]
    async fn test_success_clears_entry() {
        let (throttle, _clock) = throttle();
        for _ in 0..4 {
            throttle.try_acquire("tok").await;
        }
        throttle.record_success("tok").await;
        assert_eq!(throttle.tracked_keys(), 0);
        assert_eq!(
            throttle.try_acquire("tok").await,
            Admission::Admitted { attempts: 1 }
        );
    }

    #[tokio::test]
    async fn test_success_on_final_attempt_lifts_lockout() {
        let (throttle, _clock) = throttle();
        for _ in 0..4 {
            throttle.try_acquire("tok").await;
        }
        assert_eq!(throttle.try_acquire("tok").await, Admission::FinalAttempt);

        throttle.record_success("tok").await;
        assert!(throttle.check_allowed("tok").await.is_allowed());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (throttle, _clock) = throttle();
        for _ in 0..5 {
            throttle.try_acquire("a").await;
        }
        assert!(!throttle.check_allowed("a").await.is_allowed());
        assert!(throttle.check_allowed("b").await.is_allowed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquires_admit_at_most_threshold() {
        let (throttle, _clock) = throttle();
        let throttle = Arc::new(throttle);

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move { throttle.try_acquire("tok").await })
            })
            .collect();

        let outcomes: Vec<Admission> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let admitted = outcomes.iter().filter(|a| a.is_admitted()).count();
        let final_attempts = outcomes
            .iter()
            .filter(|a| matches!(a, Admission::FinalAttempt))
            .count();

        assert_eq!(admitted, 5);
        assert_eq!(final_attempts, 1);
    }
}

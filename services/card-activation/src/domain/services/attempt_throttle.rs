//! 失败计数与临时锁定

use async_trait::async_trait;
use chrono::Duration;

/// 锁定策略
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    /// 触发锁定的连续失败次数
    pub max_failed_attempts: u32,
    /// 锁定时长
    pub lockout: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout: Duration::minutes(15),
        }
    }
}

/// 只读检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleStatus {
    Allowed,
    LockedOut { retry_after: Duration },
}

impl ThrottleStatus {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// 距离解锁的秒数（向上取整，至少 1 秒）
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Allowed => 0,
            Self::LockedOut { retry_after } => ceil_secs(*retry_after),
        }
    }
}

/// 预占一次尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 已按失败预先计数，`attempts` 为当前累计次数
    Admitted { attempts: u32 },
    /// 已计数，且本次用掉了最后一次机会：锁定已经生效
    FinalAttempt,
    /// 后端不可用，未计数放行
    Unrecorded,
    /// 锁定期内，不计数
    LockedOut { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::LockedOut { .. })
    }

    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::LockedOut { retry_after } => ceil_secs(*retry_after),
            _ => 0,
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let millis = d.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}

/// 失败尝试节流器
///
/// 调用方在做任何昂贵的比较之前先 `try_acquire`：检查锁定与计数在同一个
/// 原子步骤内完成，因此并发请求合计最多得到 `max_failed_attempts` 次比较。
/// 比较成功后调用 `record_success` 清除状态；失败无需再次上报。
/// 实现不返回错误：后端故障时记录日志并放行。
#[async_trait]
pub trait AttemptThrottle: Send + Sync {
    /// 当前是否处于锁定期，不修改状态
    async fn check_allowed(&self, key: &str) -> ThrottleStatus;

    /// 检查锁定并把本次尝试预先记为一次失败
    ///
    /// 计数达到阈值时立即锁定并清零计数。
    async fn try_acquire(&self, key: &str) -> Admission;

    /// 成功后清除该 key 的全部状态
    async fn record_success(&self, key: &str);
}

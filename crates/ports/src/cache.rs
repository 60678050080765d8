//! Cache trait 定义

use async_trait::async_trait;
use cardgate_errors::AppResult;
use std::time::Duration;

/// 带锁定的计数结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// 已递增，未达上限
    Counted(u64),
    /// 本次递增达到上限：计数已删除，锁定键已设置
    LimitReached,
    /// 锁定键存在，未递增
    Locked { ttl_secs: i64 },
}

/// 共享缓存端口
///
/// 多实例部署下的失败计数与锁定状态保存在这里。
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 删除缓存
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 获取剩余 TTL（秒），键不存在或无过期时间时返回 None
    async fn ttl(&self, key: &str) -> AppResult<Option<i64>>;

    /// 原子地检查锁定并递增计数
    ///
    /// `lock_key` 存在时直接返回其剩余 TTL。否则递增 `counter_key`
    /// （首次创建时设置 `window`）；达到 `limit` 时删除计数并以
    /// `lockout` 为过期时间设置 `lock_key`。
    async fn incr_with_lockout(
        &self,
        counter_key: &str,
        lock_key: &str,
        limit: u64,
        window: Duration,
        lockout: Duration,
    ) -> AppResult<CounterOutcome>;
}

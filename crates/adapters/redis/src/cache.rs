//! Redis Cache 实现

use async_trait::async_trait;
use cardgate_errors::{AppError, AppResult};
use cardgate_ports::{CachePort, CounterOutcome};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

/// 锁定键存在时返回 `{0, ttl}`；否则递增计数，首次创建时设置窗口，
/// 达到上限时删除计数并设置锁定键，返回 `{2, n}`，未达上限返回 `{1, n}`
const INCR_WITH_LOCKOUT_SCRIPT: &str = r"
local lock_ttl = redis.call('TTL', KEYS[2])
if lock_ttl > 0 then
    return {0, lock_ttl}
end

local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end

if current >= tonumber(ARGV[1]) then
    redis.call('DEL', KEYS[1])
    redis.call('SET', KEYS[2], '1', 'EX', ARGV[3])
    return {2, current}
end
return {1, current}
";

/// Redis Cache
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    lockout_script: Script,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            lockout_script: Script::new(INCR_WITH_LOCKOUT_SCRIPT),
        }
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        crate::check_connection(&mut conn).await
    }
}

/// 解析脚本返回的 `{code, value}`
fn decode_counter(reply: &[i64]) -> AppResult<CounterOutcome> {
    match reply {
        [0, ttl] => Ok(CounterOutcome::Locked { ttl_secs: *ttl }),
        [1, n] => Ok(CounterOutcome::Counted((*n).max(0) as u64)),
        [2, _] => Ok(CounterOutcome::LimitReached),
        other => Err(AppError::internal(format!(
            "Unexpected lockout script reply: {:?}",
            other
        ))),
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis delete failed: {}", e)))
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis ttl failed: {}", e)))?;

        // -2 表示键不存在，-1 表示没有过期时间
        match ttl {
            -2 | -1 => Ok(None),
            t => Ok(Some(t)),
        }
    }

    async fn incr_with_lockout(
        &self,
        counter_key: &str,
        lock_key: &str,
        limit: u64,
        window: Duration,
        lockout: Duration,
    ) -> AppResult<CounterOutcome> {
        let mut conn = self.conn.clone();
        let reply: Vec<i64> = self
            .lockout_script
            .key(counter_key)
            .key(lock_key)
            .arg(limit)
            .arg(window.as_secs().max(1))
            .arg(lockout.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::internal(format!("Redis incr_with_lockout failed: {}", e)))?;

        decode_counter(&reply)
    }
}

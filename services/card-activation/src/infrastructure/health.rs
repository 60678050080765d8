//! 依赖健康检查

use async_trait::async_trait;
use cardgate_adapter_redis::RedisCache;
use cardgate_errors::AppResult;
use sqlx::PgPool;

/// 单个依赖的健康检查
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> AppResult<()>;
}

/// PostgreSQL 连接检查
pub struct PostgresHealth {
    pool: PgPool,
}

impl PostgresHealth {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthIndicator for PostgresHealth {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> AppResult<()> {
        cardgate_adapter_postgres::check_connection(&self.pool).await
    }
}

/// Redis 连接检查
pub struct RedisHealth {
    cache: RedisCache,
}

impl RedisHealth {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl HealthIndicator for RedisHealth {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> AppResult<()> {
        self.cache.ping().await
    }
}

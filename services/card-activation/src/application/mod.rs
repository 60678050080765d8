//! 应用层：命令、查询及其处理器

pub mod commands;
pub mod handlers;

use async_trait::async_trait;
use cardgate_errors::AppResult;

/// 写操作
pub trait Command: Send + Sync {
    type Output: Send;
}

/// 读操作
pub trait Query: Send + Sync {
    type Output: Send;
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> AppResult<C::Output>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> AppResult<Q::Output>;
}

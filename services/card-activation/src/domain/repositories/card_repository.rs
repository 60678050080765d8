//! 卡片仓储接口

use async_trait::async_trait;
use cardgate_common::{CardId, CardToken};
use cardgate_errors::AppResult;

use crate::domain::entities::Card;

/// 卡片仓储接口
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// 保存新卡片，令牌重复时返回 `Conflict`
    async fn create(&self, card: &Card) -> AppResult<()>;

    /// 根据公开令牌查找
    async fn find_by_token(&self, token: &CardToken) -> AppResult<Option<Card>>;

    /// 根据 ID 查找
    async fn find_by_id(&self, id: &CardId) -> AppResult<Option<Card>>;
}

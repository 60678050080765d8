//! 卡片实体

use cardgate_common::{CardId, CardToken, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 卡片
///
/// PIN 哈希只在创建时写入一次；`is_active` 只会从 `false` 变为 `true`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// 内部 ID
    pub id: CardId,
    /// 持卡人档案 ID
    pub owner_profile_id: Option<ProfileId>,
    /// PIN 哈希（PHC 字符串）
    pub pin_hash: String,
    /// 对外公开的激活令牌
    pub card_token: CardToken,
    /// 是否已激活
    pub is_active: bool,
    /// 激活时间
    pub activated_at: Option<DateTime<Utc>>,
    /// 激活操作人
    pub activated_by: Option<ProfileId>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// 创建未激活的卡片
    pub fn new(
        owner_profile_id: Option<ProfileId>,
        pin_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CardId::new(),
            owner_profile_id,
            pin_hash,
            card_token: CardToken::generate(),
            is_active: false,
            activated_at: None,
            activated_by: None,
            created_at,
        }
    }

    /// 激活卡片，已激活时返回 `false` 且不修改任何字段
    pub fn activate(&mut self, at: DateTime<Utc>, by: Option<ProfileId>) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.activated_at = Some(at);
        self.activated_by = by;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_card_is_inactive() {
        let card = Card::new(None, "$argon2id$stub".to_string(), Utc::now());
        assert!(!card.is_active);
        assert!(card.activated_at.is_none());
        assert!(!card.card_token.as_str().is_empty());
    }

    #[test]
    fn test_activate_only_once() {
        let mut card = Card::new(None, "$argon2id$stub".to_string(), Utc::now());
        let first = Utc::now();

        assert!(card.activate(first, Some(ProfileId::new("admin-1"))));
        assert!(!card.activate(Utc::now(), None));
        assert_eq!(card.activated_at, Some(first));
        assert_eq!(card.activated_by, Some(ProfileId::new("admin-1")));
    }

    #[test]
    fn test_tokens_are_distinct_from_ids() {
        let a = Card::new(None, "h".to_string(), Utc::now());
        let b = Card::new(None, "h".to_string(), Utc::now());
        assert_ne!(a.card_token, b.card_token);
        assert_ne!(a.card_token.as_str(), a.id.to_string());
    }
}

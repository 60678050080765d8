//! 进程内仓储实现（开发与测试）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cardgate_common::{CardId, CardOtpId, CardToken, ProfileId};
use cardgate_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::domain::entities::{Card, CardOtp};
use crate::domain::repositories::{CardOtpRepository, CardRepository, Redemption};

/// 内存卡片仓储
#[derive(Default)]
pub struct InMemoryCardRepository {
    cards: RwLock<HashMap<CardId, Card>>,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardRepository for InMemoryCardRepository {
    async fn create(&self, card: &Card) -> AppResult<()> {
        let mut cards = self.cards.write();
        if cards.values().any(|c| c.card_token == card.card_token) {
            return Err(AppError::conflict("card token already exists"));
        }
        cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &CardToken) -> AppResult<Option<Card>> {
        Ok(self
            .cards
            .read()
            .values()
            .find(|c| &c.card_token == token)
            .cloned())
    }

    async fn find_by_id(&self, id: &CardId) -> AppResult<Option<Card>> {
        Ok(self.cards.read().get(id).cloned())
    }
}

/// 内存 OTP 仓储
///
/// 按插入顺序保存，最后插入的即为最新记录。兑换时需要同时修改卡片，
/// 因此持有卡片仓储；加锁顺序固定为先 OTP 后卡片。
pub struct InMemoryCardOtpRepository {
    otps: Mutex<Vec<CardOtp>>,
    cards: Arc<InMemoryCardRepository>,
}

impl InMemoryCardOtpRepository {
    pub fn new(cards: Arc<InMemoryCardRepository>) -> Self {
        Self {
            otps: Mutex::new(Vec::new()),
            cards,
        }
    }
}

#[async_trait]
impl CardOtpRepository for InMemoryCardOtpRepository {
    async fn issue(&self, otp: &CardOtp) -> AppResult<u64> {
        let mut otps = self.otps.lock();

        let mut superseded = 0;
        for existing in otps
            .iter_mut()
            .filter(|o| o.card_id == otp.card_id && !o.used)
        {
            existing.used = true;
            superseded += 1;
        }

        otps.push(otp.clone());
        Ok(superseded)
    }

    async fn find_latest_for_card(&self, card_id: &CardId) -> AppResult<Option<CardOtp>> {
        Ok(self
            .otps
            .lock()
            .iter()
            .rev()
            .find(|o| &o.card_id == card_id)
            .cloned())
    }

    async fn redeem(
        &self,
        id: &CardOtpId,
        card_id: &CardId,
        activated_at: DateTime<Utc>,
        activated_by: Option<&ProfileId>,
    ) -> AppResult<Redemption> {
        let mut otps = self.otps.lock();
        let Some(otp) = otps
            .iter_mut()
            .find(|o| &o.id == id && &o.card_id == card_id && !o.used)
        else {
            return Ok(Redemption::OtpAlreadyUsed);
        };

        let mut cards = self.cards.cards.write();
        let Some(card) = cards.get_mut(card_id) else {
            return Err(AppError::not_found(format!("card {} not found", card_id)));
        };
        if !card.activate(activated_at, activated_by.cloned()) {
            return Ok(Redemption::CardAlreadyActive);
        }

        otp.used = true;
        Ok(Redemption::Activated)
    }
}

//! OTP 台账：签发、查询当前记录、一次性兑换

use std::sync::Arc;

use cardgate_common::{CardId, Clock, ProfileId};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::domain::entities::{CardOtp, OtpDestination};
use crate::domain::repositories::{CardOtpRepository, Redemption};
use crate::domain::services::{SecretHasher, hash_blocking, verify_blocking};
use crate::error::{ActivationError, ActivationResult};

/// OTP 台账
///
/// 每张卡片任一时刻至多一条可用 OTP：签发新码时作废所有未使用的旧码。
pub struct OtpLedger {
    repo: Arc<dyn CardOtpRepository>,
    hasher: Arc<dyn SecretHasher>,
    clock: Arc<dyn Clock>,
}

impl OtpLedger {
    pub fn new(
        repo: Arc<dyn CardOtpRepository>,
        hasher: Arc<dyn SecretHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            hasher,
            clock,
        }
    }

    /// 签发 OTP，返回新记录
    pub async fn issue(
        &self,
        card_id: &CardId,
        otp_plain: &str,
        destination: &OtpDestination,
        ttl: Duration,
    ) -> ActivationResult<CardOtp> {
        let otp_hash = hash_blocking(&self.hasher, otp_plain.to_string()).await?;
        let otp = CardOtp::new(*card_id, otp_hash, destination, self.clock.now(), ttl);

        let superseded = self.repo.issue(&otp).await?;

        debug!(
            card_id = %card_id,
            otp_id = %otp.id,
            superseded = superseded,
            expires_at = %otp.expires_at,
            "OTP recorded"
        );

        Ok(otp)
    }

    /// 卡片最近签发的 OTP，不判断有效性
    pub async fn current_for(&self, card_id: &CardId) -> ActivationResult<CardOtp> {
        self.repo
            .find_latest_for_card(card_id)
            .await?
            .ok_or(ActivationError::NoOtpRequested)
    }

    /// 卡片当前可兑换的 OTP
    ///
    /// 依次检查：是否签发过、是否已使用、是否过期。
    pub async fn redeemable_for(&self, card_id: &CardId) -> ActivationResult<CardOtp> {
        let otp = self.current_for(card_id).await?;
        if otp.is_redeemable(self.clock.now()) {
            return Ok(otp);
        }
        if otp.used {
            Err(ActivationError::OtpAlreadyUsed)
        } else {
            Err(ActivationError::OtpExpired)
        }
    }

    /// 比较明文与记录中的哈希
    pub async fn matches(&self, otp: &CardOtp, otp_plain: &str) -> ActivationResult<bool> {
        verify_blocking(&self.hasher, otp.otp_hash.clone(), otp_plain.to_string()).await
    }

    /// 标记已使用并激活卡片，两者在同一个存储操作内完成
    ///
    /// 并发兑换同一条记录只有一个返回 `Activated`。
    pub async fn redeem(
        &self,
        otp: &CardOtp,
        activated_at: DateTime<Utc>,
        activated_by: Option<&ProfileId>,
    ) -> ActivationResult<Redemption> {
        let outcome = self
            .repo
            .redeem(&otp.id, &otp.card_id, activated_at, activated_by)
            .await?;

        if outcome == Redemption::OtpAlreadyUsed {
            warn!(card_id = %otp.card_id, otp_id = %otp.id, "OTP consumed by a concurrent request");
        }
        Ok(outcome)
    }
}

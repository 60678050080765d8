//! 卡片激活状态机
//!
//! `Created --request_otp--> OtpPending --verify_otp--> Active`
//!
//! - `request_otp`：预占一次尝试 → 校验 PIN → 签发 OTP → 投递（有超时，失败不回滚）
//! - `verify_otp`：检查当前 OTP → 预占一次尝试 → 比较哈希 → 标记已使用并激活（同一存储操作）
//! - 已激活的卡片上两个操作都返回 `AlreadyActive`

use std::sync::Arc;
use std::time::Duration as StdDuration;

use cardgate_common::utils::mask_destination;
use cardgate_common::{CardId, CardOtpId, CardToken, Clock, ProfileId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::entities::{Card, DeliveryStatus, OtpDestination};
use crate::domain::repositories::{CardOtpRepository, CardRepository, Redemption};
use crate::domain::services::{
    Admission, AttemptThrottle, OtpLedger, OtpNotifier, SecretGenerator, SecretHasher,
    hash_blocking, verify_blocking,
};
use crate::error::{ActivationError, ActivationResult};

/// 激活流程参数
#[derive(Debug, Clone)]
pub struct ActivationPolicy {
    pub pin_length: usize,
    pub otp_length: usize,
    pub otp_ttl: Duration,
    pub notifier_timeout: StdDuration,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            pin_length: 6,
            otp_length: 6,
            otp_ttl: Duration::minutes(5),
            notifier_timeout: StdDuration::from_secs(5),
        }
    }
}

impl From<&cardgate_config::ActivationConfig> for ActivationPolicy {
    fn from(config: &cardgate_config::ActivationConfig) -> Self {
        Self {
            pin_length: config.pin_length,
            otp_length: config.otp_length,
            otp_ttl: Duration::minutes(config.otp_ttl_minutes),
            notifier_timeout: StdDuration::from_secs(config.notifier_timeout_secs),
        }
    }
}

/// 服务协作者
pub struct ActivationDependencies {
    pub cards: Arc<dyn CardRepository>,
    pub otps: Arc<dyn CardOtpRepository>,
    pub generator: Arc<dyn SecretGenerator>,
    pub hasher: Arc<dyn SecretHasher>,
    pub throttle: Arc<dyn AttemptThrottle>,
    pub notifier: Arc<dyn OtpNotifier>,
    pub clock: Arc<dyn Clock>,
}

/// 新建卡片结果，明文 PIN 只在此返回一次
#[derive(Debug, Clone)]
pub struct CreatedCard {
    pub card_id: CardId,
    pub card_token: CardToken,
    pub pin: String,
}

/// OTP 签发结果
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub otp_id: CardOtpId,
    pub expires_at: DateTime<Utc>,
    pub delivery: DeliveryStatus,
}

/// 激活结果
#[derive(Debug, Clone)]
pub struct ActivatedCard {
    pub card_id: CardId,
    pub activated_at: DateTime<Utc>,
}

/// 卡片激活状态
#[derive(Debug, Clone, Serialize)]
pub struct CardStatus {
    pub card_token: CardToken,
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
}

/// 提交 OTP 失败的计数 key，与 PIN 的计数互不影响
fn otp_throttle_key(token: &CardToken) -> String {
    format!("otp:{}", token)
}

const MAX_PIN_LENGTH: usize = 64;

/// 卡片激活服务
pub struct CardActivationService {
    cards: Arc<dyn CardRepository>,
    ledger: OtpLedger,
    generator: Arc<dyn SecretGenerator>,
    hasher: Arc<dyn SecretHasher>,
    throttle: Arc<dyn AttemptThrottle>,
    notifier: Arc<dyn OtpNotifier>,
    clock: Arc<dyn Clock>,
    policy: ActivationPolicy,
}

impl CardActivationService {
    pub fn new(deps: ActivationDependencies, policy: ActivationPolicy) -> Self {
        let ledger = OtpLedger::new(deps.otps, deps.hasher.clone(), deps.clock.clone());
        Self {
            cards: deps.cards,
            ledger,
            generator: deps.generator,
            hasher: deps.hasher,
            throttle: deps.throttle,
            notifier: deps.notifier,
            clock: deps.clock,
            policy,
        }
    }

    pub fn policy(&self) -> &ActivationPolicy {
        &self.policy
    }

    /// 创建卡片
    ///
    /// 未提供 PIN（或为空）时生成 `pin_length` 位数字 PIN。
    pub async fn create_card(
        &self,
        owner_profile_id: Option<ProfileId>,
        pin: Option<String>,
    ) -> ActivationResult<CreatedCard> {
        let pin = match pin.filter(|p| !p.is_empty()) {
            Some(p) if p.len() > MAX_PIN_LENGTH => {
                return Err(ActivationError::validation("pin too long"));
            }
            Some(p) => p,
            None => self.generator.generate(self.policy.pin_length)?,
        };

        let pin_hash = hash_blocking(&self.hasher, pin.clone()).await?;
        let card = Card::new(owner_profile_id, pin_hash, self.clock.now());
        self.cards.create(&card).await?;

        metrics::counter!("card_created_total").increment(1);
        info!(card_id = %card.id, "Card created");

        Ok(CreatedCard {
            card_id: card.id,
            card_token: card.card_token,
            pin,
        })
    }

    /// 校验 PIN 并签发 OTP
    pub async fn request_otp(
        &self,
        token: &CardToken,
        pin: &str,
        destination: &OtpDestination,
    ) -> ActivationResult<IssuedOtp> {
        debug!(card_token = %token, channel = %destination.channel(), "OTP requested");

        let status = self.throttle.check_allowed(token.as_str()).await;
        if !status.is_allowed() {
            return Err(self.throttled(token, status.retry_after_secs()));
        }

        let card = self.find_card(token).await?;

        let admission = self.throttle.try_acquire(token.as_str()).await;
        if !admission.is_admitted() {
            return Err(self.throttled(token, admission.retry_after_secs()));
        }

        let pin_ok = verify_blocking(&self.hasher, card.pin_hash.clone(), pin.to_string()).await?;
        if !pin_ok {
            metrics::counter!("card_pin_rejected_total").increment(1);
            if admission == Admission::FinalAttempt {
                warn!(card_id = %card.id, "Too many invalid PINs, card locked out");
            } else {
                warn!(card_id = %card.id, admission = ?admission, "Invalid PIN");
            }
            return Err(ActivationError::InvalidCredential);
        }
        self.throttle.record_success(token.as_str()).await;

        if card.is_active {
            return Err(ActivationError::AlreadyActive);
        }

        let code = self.generator.generate(self.policy.otp_length)?;
        let otp = self
            .ledger
            .issue(&card.id, &code, destination, self.policy.otp_ttl)
            .await?;

        metrics::counter!("card_otp_issued_total", "channel" => destination.channel().as_str())
            .increment(1);

        let delivery = self.deliver(destination, &code).await;

        info!(
            card_id = %card.id,
            otp_id = %otp.id,
            channel = %destination.channel(),
            sent_to = %mask_destination(destination.address()),
            delivery = ?delivery,
            "OTP issued"
        );

        Ok(IssuedOtp {
            otp_id: otp.id,
            expires_at: otp.expires_at,
            delivery,
        })
    }

    /// 兑换 OTP 并激活卡片
    pub async fn verify_otp(
        &self,
        token: &CardToken,
        otp: &str,
        activated_by: Option<ProfileId>,
    ) -> ActivationResult<ActivatedCard> {
        debug!(card_token = %token, "OTP verification requested");

        let otp = otp.trim();
        if otp.is_empty() {
            return Err(ActivationError::validation("otp is required"));
        }

        let throttle_key = otp_throttle_key(token);
        let status = self.throttle.check_allowed(&throttle_key).await;
        if !status.is_allowed() {
            return Err(self.throttled(token, status.retry_after_secs()));
        }

        let card = self.find_card(token).await?;
        if card.is_active {
            return Err(self.reject_otp(&card, ActivationError::AlreadyActive));
        }

        let current = match self.ledger.redeemable_for(&card.id).await {
            Ok(current) => current,
            Err(err) => return Err(self.reject_otp(&card, err)),
        };

        let admission = self.throttle.try_acquire(&throttle_key).await;
        if !admission.is_admitted() {
            return Err(self.throttled(token, admission.retry_after_secs()));
        }

        if !self.ledger.matches(&current, otp).await? {
            if admission == Admission::FinalAttempt {
                warn!(card_id = %card.id, "Too many invalid OTPs, verification locked out");
            }
            return Err(self.reject_otp(&card, ActivationError::InvalidOtp));
        }
        self.throttle.record_success(&throttle_key).await;

        let activated_at = self.clock.now();
        match self
            .ledger
            .redeem(&current, activated_at, activated_by.as_ref())
            .await?
        {
            Redemption::Activated => {}
            Redemption::OtpAlreadyUsed => {
                return Err(self.reject_otp(&card, ActivationError::OtpAlreadyUsed));
            }
            Redemption::CardAlreadyActive => {
                return Err(self.reject_otp(&card, ActivationError::AlreadyActive));
            }
        }

        metrics::counter!("card_activated_total").increment(1);
        info!(card_id = %card.id, activated_by = ?activated_by, "Card activated");

        Ok(ActivatedCard {
            card_id: card.id,
            activated_at,
        })
    }

    /// 查询卡片激活状态
    pub async fn card_status(&self, token: &CardToken) -> ActivationResult<CardStatus> {
        let card = self.find_card(token).await?;
        Ok(CardStatus {
            card_token: card.card_token,
            is_active: card.is_active,
            activated_at: card.activated_at,
        })
    }

    async fn find_card(&self, token: &CardToken) -> ActivationResult<Card> {
        self.cards
            .find_by_token(token)
            .await?
            .ok_or(ActivationError::CardNotFound)
    }

    /// 投递 OTP，失败或超时只降级为 `Unconfirmed`
    async fn deliver(&self, destination: &OtpDestination, code: &str) -> DeliveryStatus {
        let expires_in_minutes = self.policy.otp_ttl.num_minutes();
        let send = self.notifier.send(destination, code, expires_in_minutes);

        let failure = match tokio::time::timeout(self.policy.notifier_timeout, send).await {
            Ok(Ok(())) => return DeliveryStatus::Sent,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}ms",
                self.policy.notifier_timeout.as_millis()
            ),
        };

        metrics::counter!(
            "card_otp_delivery_failed_total",
            "channel" => destination.channel().as_str()
        )
        .increment(1);
        warn!(
            channel = %destination.channel(),
            sent_to = %mask_destination(destination.address()),
            error = %failure,
            "OTP delivery not confirmed"
        );

        DeliveryStatus::Unconfirmed
    }

    fn throttled(&self, token: &CardToken, retry_after_secs: u64) -> ActivationError {
        metrics::counter!("card_throttled_total").increment(1);
        warn!(
            card_token = %token,
            retry_after_secs = retry_after_secs,
            "Attempt rejected while locked out"
        );
        ActivationError::Throttled { retry_after_secs }
    }

    fn reject_otp(&self, card: &Card, err: ActivationError) -> ActivationError {
        if !err.is_internal() {
            metrics::counter!("card_otp_rejected_total", "reason" => err.rejection_reason())
                .increment(1);
            warn!(card_id = %card.id, reason = err.rejection_reason(), "OTP rejected");
        }
        err
    }
}

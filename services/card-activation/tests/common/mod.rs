//! 集成测试公共组件

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use card_activation::domain::entities::{CardOtp, OtpDestination};
use card_activation::domain::repositories::{CardOtpRepository, Redemption};
use card_activation::domain::services::{
    ActivationDependencies, ActivationPolicy, Argon2SecretHasher, CardActivationService,
    CreatedCard, OtpNotifier, SecretGenerator, ThrottlePolicy,
};
use card_activation::error::ActivationResult;
use card_activation::infrastructure::cache::InMemoryAttemptThrottle;
use card_activation::infrastructure::persistence::{
    InMemoryCardOtpRepository, InMemoryCardRepository,
};
use cardgate_common::{CardId, CardOtpId, CardToken, ManualClock, ProfileId};
use cardgate_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub const PIN: &str = "1234";
pub const DEFAULT_OTP: &str = "123456";

/// 按顺序吐出预设验证码，用完后返回 `123456`
#[derive(Default)]
pub struct ScriptedGenerator {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn push(&self, code: &str) {
        self.codes.lock().push_back(code.to_string());
    }
}

impl SecretGenerator for ScriptedGenerator {
    fn generate(&self, _length: usize) -> ActivationResult<String> {
        Ok(self
            .codes
            .lock()
            .pop_front()
            .unwrap_or_else(|| DEFAULT_OTP.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierMode {
    #[default]
    Deliver,
    Fail,
    Hang,
}

/// 记录投递内容的通知器
#[derive(Default)]
pub struct RecordingNotifier {
    mode: Mutex<NotifierMode>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn set_mode(&self, mode: NotifierMode) {
        *self.mode.lock() = mode;
    }

    /// 已投递的 (地址, 验证码)
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl OtpNotifier for RecordingNotifier {
    async fn send(
        &self,
        destination: &OtpDestination,
        code: &str,
        _expires_in_minutes: i64,
    ) -> AppResult<()> {
        let mode = *self.mode.lock();
        match mode {
            NotifierMode::Deliver => {
                self.sent
                    .lock()
                    .push((destination.address().to_string(), code.to_string()));
                Ok(())
            }
            NotifierMode::Fail => Err(AppError::external_service("smtp unavailable")),
            NotifierMode::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// 可以让下一次兑换失败的 OTP 仓储，失败时不修改任何记录
pub struct FlakyOtpRepository {
    inner: Arc<InMemoryCardOtpRepository>,
    fail_next_redeem: AtomicBool,
}

impl FlakyOtpRepository {
    pub fn new(inner: Arc<InMemoryCardOtpRepository>) -> Self {
        Self {
            inner,
            fail_next_redeem: AtomicBool::new(false),
        }
    }

    pub fn fail_next_redeem(&self) {
        self.fail_next_redeem.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CardOtpRepository for FlakyOtpRepository {
    async fn issue(&self, otp: &CardOtp) -> AppResult<u64> {
        self.inner.issue(otp).await
    }

    async fn find_latest_for_card(&self, card_id: &CardId) -> AppResult<Option<CardOtp>> {
        self.inner.find_latest_for_card(card_id).await
    }

    async fn redeem(
        &self,
        id: &CardOtpId,
        card_id: &CardId,
        activated_at: DateTime<Utc>,
        activated_by: Option<&ProfileId>,
    ) -> AppResult<Redemption> {
        if self.fail_next_redeem.swap(false, Ordering::SeqCst) {
            return Err(AppError::database("connection reset during redemption"));
        }
        self.inner
            .redeem(id, card_id, activated_at, activated_by)
            .await
    }
}

/// 全内存装配的服务，时间由 `clock` 控制
pub struct Harness {
    pub service: Arc<CardActivationService>,
    pub clock: ManualClock,
    pub generator: Arc<ScriptedGenerator>,
    pub notifier: Arc<RecordingNotifier>,
    pub otps: Arc<FlakyOtpRepository>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::starting_now();
        let generator = Arc::new(ScriptedGenerator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cards = Arc::new(InMemoryCardRepository::new());
        let otps = Arc::new(FlakyOtpRepository::new(Arc::new(
            InMemoryCardOtpRepository::new(cards.clone()),
        )));

        let deps = ActivationDependencies {
            cards,
            otps: otps.clone(),
            generator: generator.clone(),
            hasher: Arc::new(Argon2SecretHasher::new(1024, 1, 1).unwrap()),
            throttle: Arc::new(InMemoryAttemptThrottle::new(
                ThrottlePolicy::default(),
                Arc::new(clock.clone()),
            )),
            notifier: notifier.clone(),
            clock: Arc::new(clock.clone()),
        };
        let policy = ActivationPolicy {
            notifier_timeout: StdDuration::from_millis(100),
            ..ActivationPolicy::default()
        };

        Self {
            service: Arc::new(CardActivationService::new(deps, policy)),
            clock,
            generator,
            notifier,
            otps,
        }
    }

    /// 以固定 PIN 建卡
    pub async fn card(&self) -> CreatedCard {
        self.service
            .create_card(None, Some(PIN.to_string()))
            .await
            .unwrap()
    }

    /// 建卡并成功申请一次 OTP
    pub async fn card_with_otp(&self) -> CardToken {
        let card = self.card().await;
        self.service
            .request_otp(&card.card_token, PIN, &email())
            .await
            .unwrap();
        card.card_token
    }
}

pub fn email() -> OtpDestination {
    OtpDestination::email("holder@example.com").unwrap()
}

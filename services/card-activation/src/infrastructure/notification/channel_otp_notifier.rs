//! 按渠道分发 OTP

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_errors::AppResult;

use crate::domain::entities::{OtpChannel, OtpDestination};
use crate::domain::services::OtpNotifier;

/// 按 `email` / `sms` 选择具体通知器
pub struct ChannelOtpNotifier {
    email: Arc<dyn OtpNotifier>,
    sms: Arc<dyn OtpNotifier>,
}

impl ChannelOtpNotifier {
    pub fn new(email: Arc<dyn OtpNotifier>, sms: Arc<dyn OtpNotifier>) -> Self {
        Self { email, sms }
    }
}

#[async_trait]
impl OtpNotifier for ChannelOtpNotifier {
    async fn send(
        &self,
        destination: &OtpDestination,
        code: &str,
        expires_in_minutes: i64,
    ) -> AppResult<()> {
        let notifier = match destination.channel() {
            OtpChannel::Email => &self.email,
            OtpChannel::Sms => &self.sms,
        };
        notifier.send(destination, code, expires_in_minutes).await
    }
}

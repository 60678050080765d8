//! 邮件投递 OTP

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_adapter_email::{EmailMessage, EmailSender, EmailTemplate};
use cardgate_errors::{AppError, AppResult};

use crate::domain::entities::{OtpChannel, OtpDestination};
use crate::domain::services::OtpNotifier;

/// 通过 SMTP 发送 OTP 邮件
pub struct EmailOtpNotifier {
    sender: Arc<dyn EmailSender>,
    template: Arc<EmailTemplate>,
    app_name: String,
}

impl EmailOtpNotifier {
    pub fn new(
        sender: Arc<dyn EmailSender>,
        template: Arc<EmailTemplate>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            template,
            app_name: app_name.into(),
        }
    }
}

#[async_trait]
impl OtpNotifier for EmailOtpNotifier {
    async fn send(
        &self,
        destination: &OtpDestination,
        code: &str,
        expires_in_minutes: i64,
    ) -> AppResult<()> {
        if destination.channel() != OtpChannel::Email {
            return Err(AppError::internal(format!(
                "email notifier cannot deliver to {}",
                destination.channel()
            )));
        }

        let (html, text) = self
            .template
            .render_card_otp(&self.app_name, code, expires_in_minutes)?;
        let message = EmailMessage {
            to: destination.address().to_string(),
            subject: format!("{} card activation code", self.app_name),
            text_body: text,
            html_body: Some(html),
        };

        self.sender.send(&message).await
    }
}

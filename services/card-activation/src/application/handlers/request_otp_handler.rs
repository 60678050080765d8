//! 请求 OTP 处理器

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_errors::{AppError, AppResult};
use tracing::{info, warn};

use super::{non_empty, parse_card_token};
use crate::application::CommandHandler;
use crate::application::commands::{RequestOtpCommand, RequestOtpResult};
use crate::domain::entities::{DeliveryStatus, OtpChannel, OtpDestination};
use crate::domain::services::CardActivationService;

pub struct RequestOtpHandler {
    service: Arc<CardActivationService>,
}

impl RequestOtpHandler {
    pub fn new(service: Arc<CardActivationService>) -> Self {
        Self { service }
    }

    /// 根据渠道取对应的联系方式
    fn destination(command: &RequestOtpCommand) -> AppResult<OtpDestination> {
        let channel: OtpChannel = command.channel.trim().parse()?;
        let address = match channel {
            OtpChannel::Email => non_empty(command.email.clone())
                .ok_or_else(|| AppError::validation("no email available"))?,
            OtpChannel::Sms => non_empty(command.phone.clone())
                .ok_or_else(|| AppError::validation("no phone available"))?,
        };
        Ok(OtpDestination::new(channel, &address)?)
    }
}

#[async_trait]
impl CommandHandler<RequestOtpCommand> for RequestOtpHandler {
    async fn handle(&self, command: RequestOtpCommand) -> AppResult<RequestOtpResult> {
        info!(channel = %command.channel, "Handling RequestOtpCommand");

        let token = parse_card_token(&command.card_token)?;
        let destination = Self::destination(&command).inspect_err(|e| {
            warn!(error = %e, "Rejected OTP request with invalid destination");
        })?;

        let issued = self
            .service
            .request_otp(&token, &command.pin, &destination)
            .await?;

        let message = match issued.delivery {
            DeliveryStatus::Sent => "OTP sent",
            DeliveryStatus::Unconfirmed => "OTP issued, delivery not confirmed",
        };
        let expires_in_seconds = self.service.policy().otp_ttl.num_seconds();

        Ok(RequestOtpResult {
            ok: true,
            message: message.to_string(),
            delivery: issued.delivery,
            expires_in_seconds,
        })
    }
}

//! 校验 OTP 处理器

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_common::ProfileId;
use cardgate_errors::AppResult;
use tracing::info;

use super::{non_empty, parse_card_token};
use crate::application::CommandHandler;
use crate::application::commands::{VerifyOtpCommand, VerifyOtpResult};
use crate::domain::services::CardActivationService;

pub struct VerifyOtpHandler {
    service: Arc<CardActivationService>,
}

impl VerifyOtpHandler {
    pub fn new(service: Arc<CardActivationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler<VerifyOtpCommand> for VerifyOtpHandler {
    async fn handle(&self, command: VerifyOtpCommand) -> AppResult<VerifyOtpResult> {
        info!("Handling VerifyOtpCommand");

        let token = parse_card_token(&command.card_token)?;
        let activated_by = non_empty(command.activated_by).map(ProfileId::new);

        self.service
            .verify_otp(&token, &command.otp, activated_by)
            .await?;

        Ok(VerifyOtpResult {
            ok: true,
            message: "card activated".to_string(),
        })
    }
}

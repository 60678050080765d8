//! 创建卡片处理器

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_common::ProfileId;
use cardgate_errors::AppResult;
use tracing::info;

use super::non_empty;
use crate::application::CommandHandler;
use crate::application::commands::{CreateCardCommand, CreateCardResult};
use crate::domain::services::CardActivationService;

pub struct CreateCardHandler {
    service: Arc<CardActivationService>,
}

impl CreateCardHandler {
    pub fn new(service: Arc<CardActivationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CommandHandler<CreateCardCommand> for CreateCardHandler {
    async fn handle(&self, command: CreateCardCommand) -> AppResult<CreateCardResult> {
        info!("Handling CreateCardCommand");

        let owner = non_empty(command.owner_profile_id).map(ProfileId::new);
        let created = self.service.create_card(owner, command.pin).await?;

        Ok(CreateCardResult {
            card_id: created.card_id.to_string(),
            card_token: created.card_token.to_string(),
            pin: created.pin,
        })
    }
}

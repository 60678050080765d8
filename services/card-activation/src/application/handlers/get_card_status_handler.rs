//! 卡片状态查询处理器

use std::sync::Arc;

use async_trait::async_trait;
use cardgate_errors::AppResult;

use super::parse_card_token;
use crate::application::QueryHandler;
use crate::application::commands::GetCardStatusQuery;
use crate::domain::services::{CardActivationService, CardStatus};

pub struct GetCardStatusHandler {
    service: Arc<CardActivationService>,
}

impl GetCardStatusHandler {
    pub fn new(service: Arc<CardActivationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl QueryHandler<GetCardStatusQuery> for GetCardStatusHandler {
    async fn handle(&self, query: GetCardStatusQuery) -> AppResult<CardStatus> {
        let token = parse_card_token(&query.card_token)?;
        Ok(self.service.card_status(&token).await?)
    }
}

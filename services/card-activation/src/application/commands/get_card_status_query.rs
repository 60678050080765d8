//! 查询卡片激活状态

use serde::{Deserialize, Serialize};

use crate::application::Query;
use crate::domain::services::CardStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCardStatusQuery {
    pub card_token: String,
}

impl Query for GetCardStatusQuery {
    type Output = CardStatus;
}

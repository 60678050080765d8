//! 创建卡片命令

use serde::{Deserialize, Serialize};

use crate::application::Command;

/// 创建卡片命令（管理端）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCardCommand {
    /// 持卡人档案 ID
    #[serde(default)]
    pub owner_profile_id: Option<String>,
    /// 指定 PIN，缺省时自动生成
    #[serde(default)]
    pub pin: Option<String>,
}

impl Command for CreateCardCommand {
    type Output = CreateCardResult;
}

/// 创建卡片结果，`pin` 仅返回这一次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCardResult {
    pub card_id: String,
    pub card_token: String,
    pub pin: String,
}

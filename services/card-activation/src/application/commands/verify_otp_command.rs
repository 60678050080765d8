//! 校验 OTP 命令

use serde::{Deserialize, Serialize};

use crate::application::Command;

/// 校验 OTP 并激活卡片
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyOtpCommand {
    #[serde(default)]
    pub card_token: String,
    #[serde(default)]
    pub otp: String,
    /// 操作人档案 ID
    #[serde(default)]
    pub activated_by: Option<String>,
}

impl Command for VerifyOtpCommand {
    type Output = VerifyOtpResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpResult {
    pub ok: bool,
    pub message: String,
}

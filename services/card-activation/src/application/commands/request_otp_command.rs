//! 请求 OTP 命令

use serde::{Deserialize, Serialize};

use crate::application::Command;
use crate::domain::entities::DeliveryStatus;

/// 请求 OTP 命令
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOtpCommand {
    #[serde(default)]
    pub card_token: String,
    #[serde(default)]
    pub pin: String,
    /// `email` 或 `sms`
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Command for RequestOtpCommand {
    type Output = RequestOtpResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOtpResult {
    pub ok: bool,
    pub message: String,
    pub delivery: DeliveryStatus,
    pub expires_in_seconds: i64,
}

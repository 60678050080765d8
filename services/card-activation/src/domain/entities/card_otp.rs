//! 卡片激活 OTP 记录

use std::fmt;
use std::str::FromStr;

use cardgate_common::{CardId, CardOtpId};
use chrono::{DateTime, Duration, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::error::ActivationError;

/// OTP 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    Email,
    Sms,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpChannel {
    type Err = ActivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            _ => Err(ActivationError::validation("invalid channel")),
        }
    }
}

/// 已校验的投递目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpDestination {
    channel: OtpChannel,
    address: String,
}

impl OtpDestination {
    /// 校验渠道与地址
    ///
    /// 邮箱按 RFC 5322 校验；手机号允许 `+`、空格、`-`，去掉分隔符后需为 7-15 位数字。
    pub fn new(channel: OtpChannel, address: &str) -> Result<Self, ActivationError> {
        let address = address.trim();
        match channel {
            OtpChannel::Email => {
                if address.is_empty() {
                    return Err(ActivationError::validation("no email available"));
                }
                if !EmailAddress::is_valid(address) {
                    return Err(ActivationError::validation("invalid email"));
                }
            }
            OtpChannel::Sms => {
                if address.is_empty() {
                    return Err(ActivationError::validation("no phone available"));
                }
                if !is_plausible_phone(address) {
                    return Err(ActivationError::validation("invalid phone"));
                }
            }
        }

        Ok(Self {
            channel,
            address: address.to_string(),
        })
    }

    pub fn email(address: &str) -> Result<Self, ActivationError> {
        Self::new(OtpChannel::Email, address)
    }

    pub fn sms(address: &str) -> Result<Self, ActivationError> {
        Self::new(OtpChannel::Sms, address)
    }

    pub fn channel(&self) -> OtpChannel {
        self.channel
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

fn is_plausible_phone(phone: &str) -> bool {
    let body = phone.strip_prefix('+').unwrap_or(phone);
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&digits)
}

/// OTP 投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// 通知方确认已发出
    Sent,
    /// 已签发但未确认送达（通知方失败或超时），OTP 仍然有效
    Unconfirmed,
}

/// OTP 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardOtp {
    pub id: CardOtpId,
    pub card_id: CardId,
    /// OTP 哈希（PHC 字符串）
    pub otp_hash: String,
    /// 投递地址
    pub sent_to: String,
    pub channel: OtpChannel,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl CardOtp {
    pub fn new(
        card_id: CardId,
        otp_hash: String,
        destination: &OtpDestination,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: CardOtpId::new(),
            card_id,
            otp_hash,
            sent_to: destination.address().to_string(),
            channel: destination.channel(),
            expires_at: now + ttl,
            used: false,
            created_at: now,
        }
    }

    /// `now >= expires_at` 即视为过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 未使用且未过期
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

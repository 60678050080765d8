//! 命令与查询处理器

mod create_card_handler;
mod get_card_status_handler;
mod request_otp_handler;
mod verify_otp_handler;

pub use create_card_handler::*;
pub use get_card_status_handler::*;
pub use request_otp_handler::*;
pub use verify_otp_handler::*;

use cardgate_common::CardToken;
use cardgate_errors::{AppError, AppResult};

/// 解析必填的卡片令牌
fn parse_card_token(raw: &str) -> AppResult<CardToken> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(AppError::validation("card_token is required"));
    }
    Ok(CardToken::new(token))
}

/// 空字符串视为未提供
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! 仓储接口

mod card_otp_repository;
mod card_repository;

pub use card_otp_repository::*;
pub use card_repository::*;

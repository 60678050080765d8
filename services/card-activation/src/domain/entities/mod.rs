//! 领域实体

mod card;
mod card_otp;

pub use card::*;
pub use card_otp::*;

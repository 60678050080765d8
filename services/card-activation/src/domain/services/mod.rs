//! 领域服务

mod attempt_throttle;
mod card_activation_service;
mod otp_ledger;
mod otp_notifier;
mod secret_generator;
mod secret_hasher;

pub use attempt_throttle::*;
pub use card_activation_service::*;
pub use otp_ledger::*;
pub use otp_notifier::*;
pub use secret_generator::*;
pub use secret_hasher::*;

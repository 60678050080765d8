//! OTP 投递实现

mod channel_otp_notifier;
mod email_otp_notifier;
mod logging_otp_notifier;

pub use channel_otp_notifier::*;
pub use email_otp_notifier::*;
pub use logging_otp_notifier::*;

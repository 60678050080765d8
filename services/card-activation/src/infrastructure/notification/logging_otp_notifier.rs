//! 仅写日志的 OTP 通知器
//!
//! 用于开发环境以及尚未接入短信网关的渠道，验证码以明文写入日志供运维查看。

use async_trait::async_trait;
use cardgate_errors::AppResult;
use tracing::info;

use crate::domain::entities::OtpDestination;
use crate::domain::services::OtpNotifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOtpNotifier;

#[async_trait]
impl OtpNotifier for LoggingOtpNotifier {
    async fn send(
        &self,
        destination: &OtpDestination,
        code: &str,
        expires_in_minutes: i64,
    ) -> AppResult<()> {
        info!(
            channel = %destination.channel(),
            sent_to = %destination.address(),
            otp = %code,
            expires_in_minutes = expires_in_minutes,
            "OTP delivery (log only)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds() {
        let dest = OtpDestination::sms("+15551234567").unwrap();
        assert!(LoggingOtpNotifier.send(&dest, "123456", 5).await.is_ok());
    }
}

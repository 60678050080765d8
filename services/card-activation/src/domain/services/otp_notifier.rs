//! OTP 投递边界

use async_trait::async_trait;
use cardgate_errors::AppResult;

use crate::domain::entities::OtpDestination;

/// OTP 通知器
///
/// 尽力投递；失败只影响返回给调用方的投递状态，不影响 OTP 是否有效。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpNotifier: Send + Sync {
    /// 将验证码发送到目标地址
    async fn send(
        &self,
        destination: &OtpDestination,
        code: &str,
        expires_in_minutes: i64,
    ) -> AppResult<()>;
}

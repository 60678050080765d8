//! 卡片激活错误定义

use cardgate_errors::AppError;
use thiserror::Error;
use tracing::error;

/// 激活流程错误
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("{0}")]
    Validation(String),

    #[error("Card not found")]
    CardNotFound,

    #[error("Invalid PIN")]
    InvalidCredential,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("No OTP requested")]
    NoOtpRequested,

    #[error("OTP expired")]
    OtpExpired,

    #[error("OTP already used")]
    OtpAlreadyUsed,

    #[error("Card already active")]
    AlreadyActive,

    #[error("Temporarily blocked due to failed attempts")]
    Throttled { retry_after_secs: u64 },

    #[error("Secret generation failed: {0}")]
    Generation(String),

    #[error("Secret hashing failed: {0}")]
    Hashing(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] AppError),
}

impl ActivationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 是否为服务端内部故障
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Generation(_) | Self::Hashing(_) | Self::Storage(_)
        )
    }

    /// OTP 拒绝原因（指标标签）
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            Self::NoOtpRequested => "not_requested",
            Self::OtpExpired => "expired",
            Self::OtpAlreadyUsed => "already_used",
            Self::InvalidOtp => "invalid",
            Self::AlreadyActive => "already_active",
            Self::Throttled { .. } => "throttled",
            _ => "other",
        }
    }
}

pub type ActivationResult<T> = Result<T, ActivationError>;

impl From<ActivationError> for AppError {
    fn from(err: ActivationError) -> Self {
        if err.is_internal() {
            error!(error = %err, "Card activation failed with internal error");
        }

        match err {
            ActivationError::Validation(msg) => AppError::validation(msg),
            ActivationError::CardNotFound => AppError::not_found("card not found"),
            ActivationError::InvalidCredential => AppError::unauthorized("invalid pin"),
            ActivationError::InvalidOtp => AppError::unauthorized("invalid otp"),
            ActivationError::NoOtpRequested => AppError::validation("no otp requested"),
            ActivationError::OtpExpired => AppError::validation("otp expired"),
            ActivationError::OtpAlreadyUsed => AppError::validation("otp already used"),
            ActivationError::AlreadyActive => AppError::conflict("card already active"),
            ActivationError::Throttled { retry_after_secs } => AppError::too_many_requests(
                "temporarily blocked due to failed attempts",
                retry_after_secs,
            ),
            ActivationError::Generation(msg) | ActivationError::Hashing(msg) => {
                AppError::internal(msg)
            }
            ActivationError::Storage(inner) => inner,
        }
    }
}

//! 数字验证码生成

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ActivationError, ActivationResult};

/// 数字验证码生成器（PIN、OTP）
pub trait SecretGenerator: Send + Sync {
    /// 生成 `length` 位十进制数字串
    fn generate(&self, length: usize) -> ActivationResult<String>;
}

/// 基于操作系统熵源的生成器
///
/// 每位取一个随机字节对 10 取模。256 不能被 10 整除，
/// 数字 0-5 的出现概率比 6-9 略高（26/256 对 25/256）。
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecretGenerator;

impl SecretGenerator for OsSecretGenerator {
    fn generate(&self, length: usize) -> ActivationResult<String> {
        if length == 0 {
            return Err(ActivationError::Generation(
                "code length must be greater than zero".to_string(),
            ));
        }

        let mut bytes = vec![0u8; length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ActivationError::Generation(format!("entropy source failed: {}", e)))?;

        Ok(bytes.iter().map(|b| char::from(b'0' + b % 10)).collect())
    }
}

//! 秘密值（PIN、OTP）的单向哈希与校验

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use cardgate_config::HashingConfig;

use crate::error::{ActivationError, ActivationResult};

/// 秘密值哈希接口
pub trait SecretHasher: Send + Sync {
    /// 加盐哈希，输出 PHC 字符串
    fn hash(&self, plaintext: &str) -> ActivationResult<String>;

    /// 校验明文是否与哈希匹配
    fn verify(&self, hash: &str, plaintext: &str) -> ActivationResult<bool>;
}

/// Argon2id 哈希器
///
/// 校验时使用哈希串中记录的参数，调整工作因子不影响已有记录。
pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl Argon2SecretHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> ActivationResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ActivationError::Hashing(format!("invalid argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &HashingConfig) -> ActivationResult<Self> {
        Self::new(config.memory_kib, config.iterations, config.parallelism)
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash(&self, plaintext: &str) -> ActivationResult<String> {
        if plaintext.is_empty() {
            return Err(ActivationError::Hashing("empty secret".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ActivationError::Hashing(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> ActivationResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ActivationError::Hashing(format!("malformed hash: {}", e)))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ActivationError::Hashing(e.to_string())),
        }
    }
}

/// 在 blocking 线程池中哈希，避免阻塞异步 worker
pub async fn hash_blocking(
    hasher: &Arc<dyn SecretHasher>,
    plaintext: String,
) -> ActivationResult<String> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
        .await
        .map_err(|e| ActivationError::Hashing(format!("hashing task failed: {}", e)))?
}

/// 在 blocking 线程池中校验
pub async fn verify_blocking(
    hasher: &Arc<dyn SecretHasher>,
    hash: String,
    plaintext: String,
) -> ActivationResult<bool> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.verify(&hash, &plaintext))
        .await
        .map_err(|e| ActivationError::Hashing(format!("hashing task failed: {}", e)))?
}

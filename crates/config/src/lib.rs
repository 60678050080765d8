//! cardgate-config - 配置加载库

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec!["http://localhost:8081".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_allowed_origins(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出 JSON 格式日志（生产环境）
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存储（开发、测试）
    #[default]
    Memory,
    Postgres,
}

/// 存储配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub database: Option<DatabaseConfig>,
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 失败计数后端
///
/// `memory` 仅在单实例部署下有效；多实例部署必须使用 `redis`，
/// 否则攻击者可以轮换实例绕过锁定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleBackend {
    #[default]
    Memory,
    Redis,
}

/// PIN 暴力破解防护配置
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default)]
    pub backend: ThrottleBackend,
    pub redis: Option<RedisConfig>,
    /// 触发锁定的连续失败次数
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// 锁定时长（分钟）
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            backend: ThrottleBackend::default(),
            redis: None,
            max_failed_attempts: default_max_failed_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

/// 激活流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct ActivationConfig {
    /// 自动生成 PIN 的长度
    #[serde(default = "default_code_length")]
    pub pin_length: usize,
    /// OTP 长度
    #[serde(default = "default_code_length")]
    pub otp_length: usize,
    /// OTP 有效期（分钟）
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    /// 投递 OTP 的超时时间（秒）
    #[serde(default = "default_notifier_timeout_secs")]
    pub notifier_timeout_secs: u64,
}

fn default_code_length() -> usize {
    6
}

fn default_otp_ttl_minutes() -> i64 {
    5
}

fn default_notifier_timeout_secs() -> u64 {
    5
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            pin_length: default_code_length(),
            otp_length: default_code_length(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            notifier_timeout_secs: default_notifier_timeout_secs(),
        }
    }
}

/// Argon2 工作因子
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19_456 // 19 MiB
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// 邮件配置
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 模板目录，缺省时使用内置模板
    pub template_dir: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub hashing: HashingConfig,
    pub email: Option<EmailConfig>,
}

fn default_app_name() -> String {
    "cardgate".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 优先级：`APP_` 前缀环境变量 > `{APP_ENV}.toml` > `default.toml`，
    /// 嵌套字段使用 `__` 分隔，例如 `APP_THROTTLE__BACKEND=redis`。
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment)
    }

    /// 从已组装的 Figment 提取并校验配置
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 校验跨字段约束
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activation.pin_length == 0 || self.activation.otp_length == 0 {
            return Err(ConfigError::Invalid(
                "activation code lengths must be greater than zero".to_string(),
            ));
        }
        if self.activation.otp_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "activation.otp_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.throttle.max_failed_attempts == 0 || self.throttle.lockout_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "throttle thresholds must be positive".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.database.is_none() {
            return Err(ConfigError::Invalid(
                "storage.database is required for the postgres backend".to_string(),
            ));
        }
        if self.throttle.backend == ThrottleBackend::Redis && self.throttle.redis.is_none() {
            return Err(ConfigError::Invalid(
                "throttle.redis is required for the redis backend".to_string(),
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

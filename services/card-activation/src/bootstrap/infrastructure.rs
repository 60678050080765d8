//! 按配置选择存储、节流与投递实现

use std::sync::Arc;

use cardgate_adapter_email::{EmailClient, EmailSender, EmailTemplate};
use cardgate_adapter_postgres::{MigrationManager, PostgresConfig, create_pool};
use cardgate_adapter_redis::{RedisCache, create_connection_manager};
use cardgate_common::{Clock, SystemClock};
use cardgate_config::{AppConfig, EmailConfig, StorageBackend, ThrottleBackend};
use cardgate_errors::{AppError, AppResult};
use cardgate_ports::CachePort;
use chrono::Duration;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::domain::repositories::{CardOtpRepository, CardRepository};
use crate::domain::services::{
    ActivationDependencies, ActivationPolicy, Argon2SecretHasher, AttemptThrottle,
    CardActivationService, OsSecretGenerator, OtpNotifier, ThrottlePolicy,
};
use crate::infrastructure::cache::{CacheAttemptThrottle, InMemoryAttemptThrottle};
use crate::infrastructure::health::{HealthIndicator, PostgresHealth, RedisHealth};
use crate::infrastructure::notification::{
    ChannelOtpNotifier, EmailOtpNotifier, LoggingOtpNotifier,
};
use crate::infrastructure::persistence::{
    InMemoryCardOtpRepository, InMemoryCardRepository, PostgresCardOtpRepository,
    PostgresCardRepository, migrations,
};

/// 已组装的服务及其依赖的健康检查
pub struct Infrastructure {
    pub service: Arc<CardActivationService>,
    pub health_checks: Vec<Arc<dyn HealthIndicator>>,
}

type Repositories = (Arc<dyn CardRepository>, Arc<dyn CardOtpRepository>);

impl Infrastructure {
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let mut health_checks: Vec<Arc<dyn HealthIndicator>> = Vec::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (cards, otps) = Self::repositories(config, &mut health_checks).await?;
        let throttle = Self::throttle(config, clock.clone(), &mut health_checks).await?;
        let notifier = Self::notifier(config)?;

        let hasher = Argon2SecretHasher::from_config(&config.hashing)?;

        let deps = ActivationDependencies {
            cards,
            otps,
            generator: Arc::new(OsSecretGenerator),
            hasher: Arc::new(hasher),
            throttle,
            notifier,
            clock,
        };
        let service = CardActivationService::new(deps, ActivationPolicy::from(&config.activation));

        Ok(Self {
            service: Arc::new(service),
            health_checks,
        })
    }

    async fn repositories(
        config: &AppConfig,
        health_checks: &mut Vec<Arc<dyn HealthIndicator>>,
    ) -> AppResult<Repositories> {
        match (config.storage.backend, &config.storage.database) {
            (StorageBackend::Postgres, Some(db)) => {
                let pg_config = PostgresConfig::new(db.url.expose_secret())
                    .with_max_connections(db.max_connections);
                let pool = create_pool(&pg_config).await?;
                info!(
                    "PostgreSQL connection pool created (max_connections: {})",
                    db.max_connections
                );

                MigrationManager::new(pool.clone())
                    .migrate(&migrations())
                    .await?;

                health_checks.push(Arc::new(PostgresHealth::new(pool.clone())));
                Ok((
                    Arc::new(PostgresCardRepository::new(pool.clone())),
                    Arc::new(PostgresCardOtpRepository::new(pool)),
                ))
            }
            (StorageBackend::Postgres, None) => Err(AppError::internal(
                "storage.database is required for the postgres backend",
            )),
            (StorageBackend::Memory, _) => {
                if config.is_production() {
                    warn!("In-memory storage in production, cards are lost on restart");
                }
                let cards = Arc::new(InMemoryCardRepository::new());
                let otps = Arc::new(InMemoryCardOtpRepository::new(cards.clone()));
                Ok((cards as Arc<dyn CardRepository>, otps as Arc<dyn CardOtpRepository>))
            }
        }
    }

    async fn throttle(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        health_checks: &mut Vec<Arc<dyn HealthIndicator>>,
    ) -> AppResult<Arc<dyn AttemptThrottle>> {
        let policy = ThrottlePolicy {
            max_failed_attempts: config.throttle.max_failed_attempts,
            lockout: Duration::minutes(config.throttle.lockout_minutes),
        };

        match (config.throttle.backend, &config.throttle.redis) {
            (ThrottleBackend::Redis, Some(redis)) => {
                let conn = create_connection_manager(redis.url.expose_secret()).await?;
                let cache = RedisCache::new(conn);
                info!("Redis throttle store connected");

                health_checks.push(Arc::new(RedisHealth::new(cache.clone())));
                let cache: Arc<dyn CachePort> = Arc::new(cache);
                Ok(Arc::new(CacheAttemptThrottle::new(cache, policy)))
            }
            (ThrottleBackend::Redis, None) => Err(AppError::internal(
                "throttle.redis is required for the redis backend",
            )),
            (ThrottleBackend::Memory, _) => {
                if config.is_production() {
                    warn!("In-memory throttle only protects a single instance");
                }
                Ok(Arc::new(InMemoryAttemptThrottle::new(policy, clock)))
            }
        }
    }

    fn notifier(config: &AppConfig) -> AppResult<Arc<dyn OtpNotifier>> {
        let email: Arc<dyn OtpNotifier> = match &config.email {
            Some(email) => {
                let template = match &email.template_dir {
                    Some(dir) => EmailTemplate::new(dir)?,
                    None => EmailTemplate::builtin()?,
                };
                let sender: Arc<dyn EmailSender> =
                    Arc::new(EmailClient::new(email_client_config(email))?);
                info!(smtp_host = %email.smtp_host, "Email OTP delivery enabled");
                Arc::new(EmailOtpNotifier::new(
                    sender,
                    Arc::new(template),
                    config.app_name.clone(),
                ))
            }
            None => {
                if config.is_production() {
                    warn!("No email configured, OTP codes are only written to logs");
                }
                Arc::new(LoggingOtpNotifier)
            }
        };

        // 短信网关尚未接入
        let sms: Arc<dyn OtpNotifier> = Arc::new(LoggingOtpNotifier);
        Ok(Arc::new(ChannelOtpNotifier::new(email, sms)))
    }
}

fn email_client_config(config: &EmailConfig) -> cardgate_adapter_email::EmailConfig {
    cardgate_adapter_email::EmailConfig {
        smtp_host: config.smtp_host.clone(),
        smtp_port: config.smtp_port,
        username: config.username.clone(),
        password: config.password.clone(),
        from_email: config.from_email.clone(),
        from_name: config.from_name.clone(),
        use_tls: config.use_tls,
        timeout_secs: config.timeout_secs,
    }
}

//! PostgreSQL OTP 仓储实现

use async_trait::async_trait;
use cardgate_common::{CardId, CardOtpId, ProfileId};
use cardgate_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::domain::entities::{CardOtp, OtpChannel};
use crate::domain::repositories::{CardOtpRepository, Redemption};

/// PostgreSQL OTP 仓储
pub struct PostgresCardOtpRepository {
    pool: PgPool,
}

/// 数据库行模型
#[derive(sqlx::FromRow)]
struct CardOtpRow {
    id: uuid::Uuid,
    card_id: uuid::Uuid,
    otp_hash: String,
    sent_to: String,
    channel: String,
    expires_at: DateTime<Utc>,
    used: bool,
    created_at: DateTime<Utc>,
}

impl CardOtpRow {
    fn into_otp(self) -> AppResult<CardOtp> {
        let channel: OtpChannel = self
            .channel
            .parse()
            .map_err(|_| AppError::database(format!("Unknown OTP channel: {}", self.channel)))?;

        Ok(CardOtp {
            id: CardOtpId::from_uuid(self.id),
            card_id: CardId::from_uuid(self.card_id),
            otp_hash: self.otp_hash,
            sent_to: self.sent_to,
            channel,
            expires_at: self.expires_at,
            used: self.used,
            created_at: self.created_at,
        })
    }
}

impl PostgresCardOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(action: &str, e: sqlx::Error) -> AppError {
    warn!(error = %e, "Failed to {}", action);
    AppError::database(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl CardOtpRepository for PostgresCardOtpRepository {
    async fn issue(&self, otp: &CardOtp) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        // 锁住卡片行，串行化同一卡片的并发签发
        sqlx::query("SELECT id FROM cards WHERE id = $1 FOR UPDATE")
            .bind(otp.card_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("lock card", e))?;

        let superseded = sqlx::query(
            "UPDATE card_otps SET used = TRUE WHERE card_id = $1 AND used = FALSE",
        )
        .bind(otp.card_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("invalidate previous OTPs", e))?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO card_otps (
                id, card_id, otp_hash, sent_to, channel, expires_at, used, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(otp.id.0)
        .bind(otp.card_id.0)
        .bind(&otp.otp_hash)
        .bind(&otp.sent_to)
        .bind(otp.channel.as_str())
        .bind(otp.expires_at)
        .bind(otp.used)
        .bind(otp.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("save OTP", e))?;

        tx.commit().await.map_err(|e| db_error("commit OTP", e))?;

        debug!(otp_id = %otp.id, superseded = superseded, "OTP saved");
        Ok(superseded)
    }

    async fn find_latest_for_card(&self, card_id: &CardId) -> AppResult<Option<CardOtp>> {
        let row = sqlx::query_as::<_, CardOtpRow>(
            r#"
            SELECT id, card_id, otp_hash, sent_to, channel, expires_at, used, created_at
            FROM card_otps
            WHERE card_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(card_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find latest OTP", e))?;

        row.map(CardOtpRow::into_otp).transpose()
    }

    async fn redeem(
        &self,
        id: &CardOtpId,
        card_id: &CardId,
        activated_at: DateTime<Utc>,
        activated_by: Option<&ProfileId>,
    ) -> AppResult<Redemption> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let consumed = sqlx::query(
            "UPDATE card_otps SET used = TRUE WHERE id = $1 AND card_id = $2 AND used = FALSE",
        )
        .bind(id.0)
        .bind(card_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark OTP used", e))?
        .rows_affected();

        if consumed != 1 {
            tx.rollback().await.map_err(|e| db_error("rollback", e))?;
            return Ok(Redemption::OtpAlreadyUsed);
        }

        let activated = sqlx::query(
            r#"
            UPDATE cards
            SET is_active = TRUE, activated_at = $2, activated_by = $3
            WHERE id = $1 AND is_active = FALSE
            "#,
        )
        .bind(card_id.0)
        .bind(activated_at)
        .bind(activated_by.map(ProfileId::as_str))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("activate card", e))?
        .rows_affected();

        // 卡片已激活时连同 OTP 的修改一起撤销
        if activated != 1 {
            tx.rollback().await.map_err(|e| db_error("rollback", e))?;
            return Ok(Redemption::CardAlreadyActive);
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit redemption", e))?;

        debug!(otp_id = %id, card_id = %card_id, "OTP redeemed");
        Ok(Redemption::Activated)
    }
}

//! PostgreSQL 卡片仓储实现

use async_trait::async_trait;
use cardgate_common::{CardId, CardToken, ProfileId};
use cardgate_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::domain::entities::Card;
use crate::domain::repositories::CardRepository;

/// PostgreSQL 卡片仓储
pub struct PostgresCardRepository {
    pool: PgPool,
}

/// 数据库行模型
#[derive(sqlx::FromRow)]
struct CardRow {
    id: uuid::Uuid,
    owner_profile_id: Option<String>,
    pin_hash: String,
    card_token: String,
    is_active: bool,
    activated_at: Option<DateTime<Utc>>,
    activated_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl CardRow {
    fn into_card(self) -> Card {
        Card {
            id: CardId::from_uuid(self.id),
            owner_profile_id: self.owner_profile_id.map(ProfileId::new),
            pin_hash: self.pin_hash,
            card_token: CardToken::new(self.card_token),
            is_active: self.is_active,
            activated_at: self.activated_at,
            activated_by: self.activated_by.map(ProfileId::new),
            created_at: self.created_at,
        }
    }
}

const SELECT_CARD: &str = r#"
    SELECT id, owner_profile_id, pin_hash, card_token, is_active,
           activated_at, activated_by, created_at
    FROM cards
"#;

impl PostgresCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CardRepository for PostgresCardRepository {
    async fn create(&self, card: &Card) -> AppResult<()> {
        debug!(card_id = %card.id, "Saving card");

        sqlx::query(
            r#"
            INSERT INTO cards (
                id, owner_profile_id, pin_hash, card_token, is_active,
                activated_at, activated_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(card.id.0)
        .bind(card.owner_profile_id.as_ref().map(ProfileId::as_str))
        .bind(&card.pin_hash)
        .bind(card.card_token.as_str())
        .bind(card.is_active)
        .bind(card.activated_at)
        .bind(card.activated_by.as_ref().map(ProfileId::as_str))
        .bind(card.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return AppError::conflict("card token already exists");
            }
            warn!(error = %e, "Failed to save card");
            AppError::database(format!("Failed to save card: {}", e))
        })?;

        Ok(())
    }

    async fn find_by_token(&self, token: &CardToken) -> AppResult<Option<Card>> {
        let sql = format!("{} WHERE card_token = $1", SELECT_CARD);
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to find card by token");
                AppError::database(format!("Failed to find card: {}", e))
            })?;

        Ok(row.map(CardRow::into_card))
    }

    async fn find_by_id(&self, id: &CardId) -> AppResult<Option<Card>> {
        let sql = format!("{} WHERE id = $1", SELECT_CARD);
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to find card by id");
                AppError::database(format!("Failed to find card: {}", e))
            })?;

        Ok(row.map(CardRow::into_card))
    }
}

//! 数据库结构

use cardgate_adapter_postgres::Migration;

/// 按版本排列的迁移
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_cards",
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id UUID PRIMARY KEY,
                owner_profile_id TEXT,
                pin_hash TEXT NOT NULL,
                card_token TEXT NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT FALSE,
                activated_at TIMESTAMPTZ,
                activated_by TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ),
        Migration::new(
            2,
            "create_card_otps",
            r#"
            CREATE TABLE IF NOT EXISTS card_otps (
                id UUID PRIMARY KEY,
                card_id UUID NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                otp_hash TEXT NOT NULL,
                sent_to TEXT NOT NULL,
                channel TEXT NOT NULL CHECK (channel IN ('email', 'sms')),
                expires_at TIMESTAMPTZ NOT NULL,
                used BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ),
        Migration::new(
            3,
            "index_card_otps_card_id_created_at",
            "CREATE INDEX IF NOT EXISTS idx_card_otps_card_id_created_at ON card_otps (card_id, created_at DESC)",
        ),
    ]
}

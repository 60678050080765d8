//! PostgreSQL 迁移
//!
//! 按版本顺序应用内嵌的 DDL，已应用的版本记录在 `_migrations` 表中。
//! 多个实例同时启动时通过事务级 advisory lock 串行执行。

use cardgate_errors::{AppError, AppResult};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, info};

const MIGRATION_TABLE: &str = "_migrations";

/// advisory lock 键，同一数据库内所有实例共用
const MIGRATION_LOCK_KEY: i64 = 0x6361_7264_6761_7465;

/// 单个迁移
///
/// 每个迁移只包含一条 SQL 语句（预处理语句不支持多语句）。
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
    /// SQL 的 SHA-256，用于发现已应用迁移被改动
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = hex::encode(Sha256::digest(sql.as_bytes()));
        Self {
            version,
            name: name.into(),
            sql,
            checksum,
        }
    }
}

/// 已应用的迁移
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub checksum: String,
}

/// 迁移执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
}

/// 计算待执行的迁移（按版本升序）
///
/// 已应用版本的校验和不一致时返回错误。
pub fn plan<'a>(
    migrations: &'a [Migration],
    applied: &[AppliedMigration],
) -> AppResult<(Vec<&'a Migration>, Vec<i64>)> {
    let mut sorted: Vec<&Migration> = migrations.iter().collect();
    sorted.sort_by_key(|m| m.version);

    if let Some(pair) = sorted.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(AppError::internal(format!(
            "duplicate migration version {}",
            pair[0].version
        )));
    }

    let mut pending = Vec::new();
    let mut skipped = Vec::new();
    for migration in sorted {
        match applied.iter().find(|a| a.version == migration.version) {
            Some(record) if record.checksum != migration.checksum => {
                return Err(AppError::database(format!(
                    "migration {} ({}) was modified after being applied",
                    migration.version, migration.name
                )));
            }
            Some(_) => skipped.push(migration.version),
            None => pending.push(migration),
        }
    }
    Ok((pending, skipped))
}

/// 迁移执行器
pub struct MigrationManager {
    pool: PgPool,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在一个事务内应用所有待执行迁移
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationReport> {
        let mut tx = self.pool.begin().await.map_err(|e| db("begin migration", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| db("acquire migration lock", e))?;

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#
        );
        sqlx::query(&create_table)
            .execute(&mut *tx)
            .await
            .map_err(|e| db("create migration table", e))?;

        let applied: Vec<AppliedMigration> = sqlx::query_as(&format!(
            "SELECT version, checksum FROM {MIGRATION_TABLE} ORDER BY version"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db("load applied migrations", e))?;

        let (pending, skipped) = plan(migrations, &applied)?;
        let mut report = MigrationReport {
            applied: Vec::with_capacity(pending.len()),
            skipped,
        };

        let record =
            format!("INSERT INTO {MIGRATION_TABLE} (version, name, checksum) VALUES ($1, $2, $3)");
        for migration in pending {
            debug!(version = migration.version, name = %migration.name, "Applying migration");

            sqlx::query(&migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| db(&format!("apply migration {}", migration.version), e))?;
            sqlx::query(&record)
                .bind(migration.version)
                .bind(&migration.name)
                .bind(&migration.checksum)
                .execute(&mut *tx)
                .await
                .map_err(|e| db("record migration", e))?;

            report.applied.push(migration.version);
        }

        tx.commit().await.map_err(|e| db("commit migrations", e))?;

        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Database migrations complete"
        );
        Ok(report)
    }
}

fn db(action: &str, e: sqlx::Error) -> AppError {
    AppError::database(format!("Failed to {}: {}", action, e))
}

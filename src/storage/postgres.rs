//! PostgreSQL-backed stores.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{RawRow, RowStore, SecretStore, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct DbRow {
    id: String,
    sk: String,
    detail: Value,
}

impl From<DbRow> for RawRow {
    fn from(r: DbRow) -> Self {
        Self {
            id: r.id,
            sk: r.sk,
            detail: r.detail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn create(
        &self,
        id: &str,
        sk: &str,
        detail: Value,
        overwrite: bool,
    ) -> Result<RawRow, StoreError> {
        if overwrite {
            let row = sqlx::query_as::<_, DbRow>(
                r#"
                INSERT INTO rows (id, sk, detail)
                VALUES ($1, $2, $3)
                ON CONFLICT (id, sk) DO UPDATE SET detail = EXCLUDED.detail
                RETURNING id, sk, detail
                "#,
            )
            .bind(id)
            .bind(sk)
            .bind(&detail)
            .fetch_one(&self.pool)
            .await?;

            Ok(row.into())
        } else {
            let inserted = sqlx::query_as::<_, DbRow>(
                r#"
                INSERT INTO rows (id, sk, detail)
                VALUES ($1, $2, $3)
                ON CONFLICT (id, sk) DO NOTHING
                RETURNING id, sk, detail
                "#,
            )
            .bind(id)
            .bind(sk)
            .bind(&detail)
            .fetch_optional(&self.pool)
            .await?;

            inserted
                .map(Into::into)
                .ok_or_else(|| StoreError::Conflict { sk: sk.to_string() })
        }
    }

    async fn get(&self, id: &str, sk: &str) -> Result<Option<RawRow>, StoreError> {
        let row = sqlx::query_as::<_, DbRow>(
            "SELECT id, sk, detail FROM rows WHERE id = $1 AND sk = $2",
        )
        .bind(id)
        .bind(sk)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, row: RawRow) -> Result<RawRow, StoreError> {
        let updated = sqlx::query_as::<_, DbRow>(
            r#"
            UPDATE rows SET detail = $3
            WHERE id = $1 AND sk = $2
            RETURNING id, sk, detail
            "#,
        )
        .bind(&row.id)
        .bind(&row.sk)
        .bind(&row.detail)
        .fetch_optional(&self.pool)
        .await?;

        updated
            .map(Into::into)
            .ok_or(StoreError::NotFound { sk: row.sk })
    }
}

#[derive(Debug, Clone)]
pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM secrets WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set(&self, name: &str, value: &str, create_only: bool) -> Result<(), StoreError> {
        // With create_only a concurrent winner's value is kept; callers re-read.
        let sql = if create_only {
            "INSERT INTO secrets (name, value) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING"
        } else {
            "INSERT INTO secrets (name, value) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value"
        };

        sqlx::query(sql)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

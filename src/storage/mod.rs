//! Persistence capabilities consumed by the token core.
//!
//! The core talks to two stores through trait objects so that tests can swap
//! in in-memory implementations:
//!
//! - [`RowStore`]: key-value rows addressed by `(id, sk)` with a JSON detail
//!   column. Holds login records, refresh records, and TOTP records.
//! - [`SecretStore`]: named base64 blobs. Holds the signing key pair.
//!
//! PostgreSQL implementations live in [`postgres`]; in-memory implementations
//! for tests live in [`memory`] behind the `test-utils` feature.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Create with `overwrite = false` hit an existing row.
    #[error("row already exists: {sk}")]
    Conflict { sk: String },

    #[error("row not found: {sk}")]
    NotFound { sk: String },

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("invalid row detail")]
    Serde(#[from] serde_json::Error),
}

/// An untyped row as stored: partition key, sort key, JSON detail.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub id: String,
    pub sk: String,
    pub detail: Value,
}

/// A row with its detail deserialized into a concrete type.
#[derive(Debug, Clone)]
pub struct Row<T> {
    pub id: String,
    pub sk: String,
    pub detail: T,
}

impl<T: DeserializeOwned> Row<T> {
    fn from_raw(raw: RawRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: raw.id,
            sk: raw.sk,
            detail: serde_json::from_value(raw.detail)?,
        })
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Writes a row. With `overwrite = false` the write is create-if-absent
    /// and an existing row yields [`StoreError::Conflict`].
    async fn create(
        &self,
        id: &str,
        sk: &str,
        detail: Value,
        overwrite: bool,
    ) -> Result<RawRow, StoreError>;

    async fn get(&self, id: &str, sk: &str) -> Result<Option<RawRow>, StoreError>;

    /// Replaces the detail of an existing row.
    async fn update(&self, row: RawRow) -> Result<RawRow, StoreError>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Stores a base64 blob. With `create_only = true` the write is
    /// create-if-absent: a concurrent winner's value is left untouched and
    /// the call still succeeds, so callers must re-read to observe the
    /// canonical value.
    async fn set(&self, name: &str, value: &str, create_only: bool) -> Result<(), StoreError>;
}

/// Typed wrapper over [`RowStore::create`].
pub async fn create_row<T: Serialize + DeserializeOwned>(
    store: &dyn RowStore,
    id: &str,
    sk: &str,
    detail: &T,
    overwrite: bool,
) -> Result<Row<T>, StoreError> {
    let raw = store
        .create(id, sk, serde_json::to_value(detail)?, overwrite)
        .await?;
    Row::from_raw(raw)
}

/// Typed wrapper over [`RowStore::get`].
pub async fn get_row<T: DeserializeOwned>(
    store: &dyn RowStore,
    id: &str,
    sk: &str,
) -> Result<Option<Row<T>>, StoreError> {
    match store.get(id, sk).await? {
        Some(raw) => Ok(Some(Row::from_raw(raw)?)),
        None => Ok(None),
    }
}

/// Typed wrapper over [`RowStore::update`].
pub async fn update_row<T: Serialize + DeserializeOwned>(
    store: &dyn RowStore,
    row: Row<T>,
) -> Result<Row<T>, StoreError> {
    let raw = store
        .update(RawRow {
            id: row.id,
            sk: row.sk,
            detail: serde_json::to_value(&row.detail)?,
        })
        .await?;
    Row::from_raw(raw)
}

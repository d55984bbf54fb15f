//! In-memory stores for tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::{RawRow, RowStore, SecretStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryRowStore {
    rows: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn create(
        &self,
        id: &str,
        sk: &str,
        detail: Value,
        overwrite: bool,
    ) -> Result<RawRow, StoreError> {
        let mut rows = self.rows.write().unwrap();
        let key = (id.to_string(), sk.to_string());
        if !overwrite && rows.contains_key(&key) {
            return Err(StoreError::Conflict { sk: sk.to_string() });
        }
        rows.insert(key, detail.clone());
        Ok(RawRow {
            id: id.to_string(),
            sk: sk.to_string(),
            detail,
        })
    }

    async fn get(&self, id: &str, sk: &str) -> Result<Option<RawRow>, StoreError> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .get(&(id.to_string(), sk.to_string()))
            .map(|detail| RawRow {
                id: id.to_string(),
                sk: sk.to_string(),
                detail: detail.clone(),
            }))
    }

    async fn update(&self, row: RawRow) -> Result<RawRow, StoreError> {
        let mut rows = self.rows.write().unwrap();
        let key = (row.id.clone(), row.sk.clone());
        if !rows.contains_key(&key) {
            return Err(StoreError::NotFound { sk: row.sk });
        }
        rows.insert(key, row.detail.clone());
        Ok(row)
    }
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let secrets = self.secrets.read().unwrap();
        Ok(secrets.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str, create_only: bool) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write().unwrap();
        if create_only && secrets.contains_key(name) {
            return Ok(());
        }
        secrets.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

//! Key-value settings persistence.
//!
//! The sync engine keeps its cursors, server watermarks and one-shot flags in
//! host-provided settings storage (SharedPreferences, plist, a settings table —
//! whatever the host has). The engine only depends on the [`SettingsStore`]
//! trait; [`MemorySettingsStore`] is provided for tests and ephemeral hosts.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key-value preferences storage.
///
/// Implementations must persist writes before returning: the engine relies on
/// a cursor written after a successful sync surviving a process restart.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value.
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value.
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value.
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value.
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists.
    async fn has_key(&self, key: &str) -> Result<bool>;
}

/// In-memory settings store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" })
            .await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .get_string(key)
            .await?
            .map(|v| v == "true" || v == "1"))
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().await.contains_key(key))
    }
}

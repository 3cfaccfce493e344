//! Typed access to the engine's persisted state.
//!
//! Cursors, per-subsystem server watermarks, one-shot flags and listening
//! statistics all live in host-provided key-value settings storage. This
//! wrapper owns the key names so the rest of the engine never handles raw
//! strings.

use std::sync::Arc;

use bridge_traits::sync::DeviceStatsRecord;
use bridge_traits::SettingsStore;
use uuid::Uuid;

use crate::error::Result;

const KEY_LAST_MODIFIED: &str = "sync.last_modified";
const KEY_HOME_GRID_NEEDS_REFRESH: &str = "sync.home_grid_needs_refresh";
const KEY_UP_NEXT_SERVER_MODIFIED: &str = "sync.up_next_server_modified";
const KEY_STARRED_SERVER_MODIFIED: &str = "sync.starred_server_modified";
const KEY_HISTORY_SERVER_MODIFIED: &str = "sync.history_server_modified";
const KEY_CLEAR_HISTORY_TIME: &str = "sync.clear_history_time";
const KEY_DEVICE_ID: &str = "sync.device_id";

const KEY_TIME_LISTENED: &str = "stats.time_listened_secs";
const KEY_TIME_SKIPPING: &str = "stats.time_skipping_secs";
const KEY_TIME_INTRO_SKIPPING: &str = "stats.time_intro_skipping_secs";
const KEY_TIME_VARIABLE_SPEED: &str = "stats.time_variable_speed_secs";
const KEY_TIME_SILENCE_REMOVAL: &str = "stats.time_silence_removal_secs";

/// Prefix for settings the server pushes down in an incremental delta.
const SERVER_SETTING_PREFIX: &str = "server.";

/// Prefix under which the account-wide statistic totals returned by the
/// server are cached for display.
const SERVER_STATS_PREFIX: &str = "stats.server.";

#[derive(Clone)]
pub struct SyncSettings {
    store: Arc<dyn SettingsStore>,
}

impl SyncSettings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Incremental sync cursor. `None` means no full sync has completed yet.
    pub async fn last_modified(&self) -> Result<Option<String>> {
        Ok(self.store.get_string(KEY_LAST_MODIFIED).await?)
    }

    pub async fn set_last_modified(&self, cursor: &str) -> Result<()> {
        Ok(self.store.set_string(KEY_LAST_MODIFIED, cursor).await?)
    }

    /// One-shot flag requesting a home-grid re-import on the next sync.
    pub async fn home_grid_needs_refresh(&self) -> Result<bool> {
        Ok(self
            .store
            .get_bool(KEY_HOME_GRID_NEEDS_REFRESH)
            .await?
            .unwrap_or(false))
    }

    pub async fn set_home_grid_needs_refresh(&self, value: bool) -> Result<()> {
        Ok(self.store.set_bool(KEY_HOME_GRID_NEEDS_REFRESH, value).await?)
    }

    /// Up-next server watermark, 0 before the first exchange.
    pub async fn up_next_server_modified(&self) -> Result<i64> {
        Ok(self
            .store
            .get_i64(KEY_UP_NEXT_SERVER_MODIFIED)
            .await?
            .unwrap_or(0))
    }

    pub async fn set_up_next_server_modified(&self, value: i64) -> Result<()> {
        Ok(self.store.set_i64(KEY_UP_NEXT_SERVER_MODIFIED, value).await?)
    }

    pub async fn starred_server_modified(&self) -> Result<i64> {
        Ok(self
            .store
            .get_i64(KEY_STARRED_SERVER_MODIFIED)
            .await?
            .unwrap_or(0))
    }

    pub async fn set_starred_server_modified(&self, value: i64) -> Result<()> {
        Ok(self.store.set_i64(KEY_STARRED_SERVER_MODIFIED, value).await?)
    }

    pub async fn history_server_modified(&self) -> Result<i64> {
        Ok(self
            .store
            .get_i64(KEY_HISTORY_SERVER_MODIFIED)
            .await?
            .unwrap_or(0))
    }

    pub async fn set_history_server_modified(&self, value: i64) -> Result<()> {
        Ok(self.store.set_i64(KEY_HISTORY_SERVER_MODIFIED, value).await?)
    }

    /// When the user last cleared their listening history, milliseconds.
    /// 0 means no clear is pending upload.
    pub async fn clear_history_time(&self) -> Result<i64> {
        Ok(self.store.get_i64(KEY_CLEAR_HISTORY_TIME).await?.unwrap_or(0))
    }

    pub async fn set_clear_history_time(&self, value: i64) -> Result<()> {
        Ok(self.store.set_i64(KEY_CLEAR_HISTORY_TIME, value).await?)
    }

    /// Stable device identifier, generated and persisted on first use.
    pub async fn device_id(&self) -> Result<String> {
        if let Some(existing) = self.store.get_string(KEY_DEVICE_ID).await? {
            return Ok(existing);
        }
        let generated = Uuid::new_v4().to_string();
        self.store.set_string(KEY_DEVICE_ID, &generated).await?;
        Ok(generated)
    }

    /// Locally accumulated listening statistics, for upload.
    pub async fn device_stats(&self) -> Result<DeviceStatsRecord> {
        Ok(DeviceStatsRecord {
            time_listened_secs: self.stat(KEY_TIME_LISTENED).await?,
            time_skipping_secs: self.stat(KEY_TIME_SKIPPING).await?,
            time_intro_skipping_secs: self.stat(KEY_TIME_INTRO_SKIPPING).await?,
            time_variable_speed_secs: self.stat(KEY_TIME_VARIABLE_SPEED).await?,
            time_silence_removal_secs: self.stat(KEY_TIME_SILENCE_REMOVAL).await?,
        })
    }

    /// Cache the merged account-wide totals the server returned.
    pub async fn cache_server_stats(&self, stats: &DeviceStatsRecord) -> Result<()> {
        let entries = [
            (KEY_TIME_LISTENED, stats.time_listened_secs),
            (KEY_TIME_SKIPPING, stats.time_skipping_secs),
            (KEY_TIME_INTRO_SKIPPING, stats.time_intro_skipping_secs),
            (KEY_TIME_VARIABLE_SPEED, stats.time_variable_speed_secs),
            (KEY_TIME_SILENCE_REMOVAL, stats.time_silence_removal_secs),
        ];
        for (key, value) in entries {
            let cached = format!("{SERVER_STATS_PREFIX}{}", key.trim_start_matches("stats."));
            self.store.set_i64(&cached, value).await?;
        }
        Ok(())
    }

    /// Store a server-pushed device setting under a namespaced key.
    pub async fn apply_server_setting(&self, key: &str, value: &str) -> Result<()> {
        let namespaced = format!("{SERVER_SETTING_PREFIX}{key}");
        Ok(self.store.set_string(&namespaced, value).await?)
    }

    async fn stat(&self, key: &str) -> Result<i64> {
        Ok(self.store.get_i64(key).await?.unwrap_or(0))
    }
}

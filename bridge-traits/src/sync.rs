//! Sync service client trait and wire DTOs.
//!
//! The sync server owns the wire format; this module mirrors it as plain serde
//! structs. Timestamps on the wire are Unix milliseconds, playback offsets are
//! seconds. Every mutable field in an upload record travels with its
//! last-local-change timestamp so the server can order writes from multiple
//! devices.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Incremental update
// ============================================================================

/// One batched incremental sync exchange: everything dirty on the device goes
/// up, everything newer on the server comes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUpdateRequest {
    /// Stable unique device identifier.
    pub device_id: String,
    /// Cursor returned by the previous successful sync.
    pub last_modified: String,
    /// Dirty records collected from local storage.
    pub records: Vec<UploadRecord>,
}

/// A single dirty record in the upload payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadRecord {
    Podcast(PodcastRecord),
    Episode(EpisodeRecord),
    Filter(FilterRecord),
    Folder(FolderRecord),
    Device(DeviceStatsRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastRecord {
    pub uuid: String,
    pub is_subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_from_secs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_last_secs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
}

/// Episode upload record. Only fields whose dirty timestamp is set locally are
/// populated; the paired `*_modified` millisecond timestamp always travels
/// with the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub uuid: String,
    pub podcast_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing_status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing_status_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played_up_to: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played_up_to_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_modified: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRecord {
    pub uuid: String,
    pub title: String,
    pub sort_position: i32,
    pub deleted: bool,
    pub unplayed: bool,
    pub partially_played: bool,
    pub finished: bool,
    pub audio_video: i32,
    pub filter_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRecord {
    pub uuid: String,
    pub name: String,
    pub color: i32,
    pub sort_position: i32,
    pub podcasts_sort_type: i32,
    pub date_added: i64,
    pub deleted: bool,
}

/// Device listening statistics, accumulated locally and merged server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatsRecord {
    pub time_listened_secs: i64,
    pub time_skipping_secs: i64,
    pub time_intro_skipping_secs: i64,
    pub time_variable_speed_secs: i64,
    pub time_silence_removal_secs: i64,
}

/// Server delta returned from an incremental update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncUpdateResponse {
    /// New cursor to persist once the delta has been fully applied.
    pub last_modified: Option<String>,
    #[serde(default)]
    pub episodes: Vec<EpisodeDelta>,
    #[serde(default)]
    pub podcasts: Vec<PodcastDelta>,
    #[serde(default)]
    pub filters: Vec<FilterDelta>,
    #[serde(default)]
    pub folders: Vec<FolderDelta>,
    #[serde(default)]
    pub device_settings: Vec<SettingDelta>,
    #[serde(default)]
    pub stats: Option<DeviceStatsRecord>,
}

/// Server-side episode state. Absent fields were not changed on the server
/// since the device's cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeDelta {
    pub uuid: String,
    #[serde(default)]
    pub podcast_uuid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<i64>,
    #[serde(default)]
    pub playing_status: Option<i32>,
    #[serde(default)]
    pub played_up_to: Option<f64>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub starred: Option<bool>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastDelta {
    pub uuid: String,
    pub is_subscribed: bool,
    #[serde(default)]
    pub start_from_secs: Option<i32>,
    #[serde(default)]
    pub skip_last_secs: Option<i32>,
    #[serde(default)]
    pub folder_uuid: Option<String>,
    #[serde(default)]
    pub sort_position: Option<i32>,
    #[serde(default)]
    pub date_added: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDelta {
    pub uuid: String,
    pub title: String,
    #[serde(default)]
    pub sort_position: i32,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub unplayed: bool,
    #[serde(default)]
    pub partially_played: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub audio_video: i32,
    #[serde(default)]
    pub filter_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDelta {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub color: i32,
    #[serde(default)]
    pub sort_position: i32,
    #[serde(default)]
    pub podcasts_sort_type: i32,
    #[serde(default)]
    pub date_added: i64,
    #[serde(default)]
    pub deleted: bool,
}

/// Server-pushed device setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingDelta {
    pub key: String,
    pub value: String,
}

// ============================================================================
// Home folder (full sync)
// ============================================================================

/// The user's complete home grid: every subscribed podcast and every folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeFolderResponse {
    #[serde(default)]
    pub podcasts: Vec<PodcastDelta>,
    #[serde(default)]
    pub folders: Vec<FolderDelta>,
}

// ============================================================================
// Up-next
// ============================================================================

/// Up-next exchange request. The body is produced by a codec in the engine;
/// these structs define the logical shape shared by all codecs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpNextSyncRequest {
    pub device_id: String,
    /// Server watermark from the last successful exchange, 0 before the first.
    pub server_modified: i64,
    pub changes: Vec<UpNextChangeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpNextChangeRecord {
    pub action: i32,
    pub modified: i64,
    /// Single episode for Add/Remove/Current actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<UpNextEpisodeRecord>,
    /// Ordered episode list for Replace actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<UpNextEpisodeRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpNextEpisodeRecord {
    pub uuid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub podcast_uuid: Option<String>,
    #[serde(default)]
    pub published_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpNextSyncResponse {
    pub server_modified: i64,
    #[serde(default)]
    pub episodes: Vec<UpNextEpisodeRecord>,
}

// ============================================================================
// Starred
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarredEpisode {
    pub uuid: String,
    pub podcast_uuid: String,
    pub starred: bool,
    /// When the star state last changed, server time, milliseconds.
    pub starred_modified: i64,
}

// ============================================================================
// History
// ============================================================================

/// History change actions shared by upload and download records.
pub mod history_action {
    pub const ADD: i32 = 1;
    pub const DELETE: i32 = 2;
    pub const CLEAR_ALL: i32 = 3;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySyncRequest {
    pub device_id: String,
    pub server_modified: i64,
    pub changes: Vec<HistoryChangeRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryChangeRecord {
    pub action: i32,
    /// Interaction time for Add/Delete, clear time for ClearAll. Milliseconds.
    pub modified: i64,
    #[serde(default)]
    pub episode_uuid: Option<String>,
    #[serde(default)]
    pub podcast_uuid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySyncResponse {
    pub server_modified: i64,
    #[serde(default)]
    pub last_cleared: Option<i64>,
    #[serde(default)]
    pub changes: Vec<HistoryChangeRecord>,
}

// ============================================================================
// Client trait
// ============================================================================

/// Authenticated sync service client.
///
/// Hosts provide the transport (HTTP stack, token refresh, retries); the
/// engine only sees typed requests and responses. A `304 Not Modified` on the
/// up-next endpoint maps to `Ok(None)` rather than an error.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Whether an account token is available. When false, sync is a no-op.
    async fn is_logged_in(&self) -> bool;

    /// Server's current last-sync timestamp. Fetched before a full sync so
    /// changes made while the sync runs are not skipped by the next cursor.
    async fn last_sync_at(&self) -> Result<String>;

    /// Download the complete home grid (podcasts and folders).
    async fn home_folder(&self) -> Result<HomeFolderResponse>;

    /// Download all server-side episode filters.
    async fn filters(&self) -> Result<Vec<FilterDelta>>;

    /// Upload dirty records and receive the server delta since the cursor.
    async fn sync_update(&self, request: SyncUpdateRequest) -> Result<SyncUpdateResponse>;

    /// Exchange the up-next queue. The body is pre-encoded by a codec;
    /// `Ok(None)` means the server replied `304 Not Modified`.
    async fn up_next_sync(&self, body: Bytes, content_type: &'static str)
        -> Result<Option<Bytes>>;

    /// Download the account's starred episodes.
    async fn starred_episodes(&self) -> Result<Vec<StarredEpisode>>;

    /// Exchange playback history.
    async fn history_sync(&self, request: HistorySyncRequest) -> Result<HistorySyncResponse>;
}

//! Domain models for the podcast library.
//!
//! Every entity is identified by a stable uuid assigned by the catalogue
//! server (or generated locally for user-created entities). Mutable fields
//! that participate in sync carry a paired `*_modified` millisecond timestamp:
//! non-null means the local value has diverged from the last acknowledged
//! server value and must be uploaded; null means clean.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// How far through an episode the user is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[repr(i32)]
pub enum PlayingStatus {
    #[default]
    NotPlayed = 0,
    InProgress = 1,
    Completed = 2,
}

impl PlayingStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(PlayingStatus::NotPlayed),
            1 => Some(PlayingStatus::InProgress),
            2 => Some(PlayingStatus::Completed),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Local download state of an episode's media file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[repr(i32)]
pub enum EpisodeStatus {
    #[default]
    NotDownloaded = 0,
    Queued = 1,
    Downloading = 2,
    Downloaded = 3,
}

/// Row-level sync state used by entities that sync as whole records rather
/// than per field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[repr(i32)]
pub enum SyncStatus {
    #[default]
    NotSynced = 0,
    Synced = 1,
}

/// A local mutation of the up-next queue, recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum UpNextAction {
    PlayNow = 1,
    PlayNext = 2,
    PlayLast = 3,
    Remove = 4,
    Replace = 5,
}

impl UpNextAction {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(UpNextAction::PlayNow),
            2 => Some(UpNextAction::PlayNext),
            3 => Some(UpNextAction::PlayLast),
            4 => Some(UpNextAction::Remove),
            5 => Some(UpNextAction::Replace),
            _ => None,
        }
    }
}

// =============================================================================
// Podcast
// =============================================================================

/// A podcast subscription. "Deleted" is modelled as unsubscribe, never row
/// deletion, so the diff protocol can keep referring to the uuid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Podcast {
    pub uuid: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub description: String,
    /// Predicted publish time of the next episode, milliseconds.
    pub estimated_next_episode_at: Option<i64>,
    pub funding_url: Option<String>,
    pub is_subscribed: bool,
    /// Per-podcast auto start offset, seconds.
    pub start_from_secs: i32,
    /// Per-podcast skip-outro length, seconds.
    pub skip_last_secs: i32,
    pub folder_uuid: Option<String>,
    pub sort_position: i32,
    /// When the user subscribed, milliseconds.
    pub date_added: Option<i64>,
    pub sync_status: SyncStatus,
}

impl Podcast {
    pub fn new(uuid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            author: String::new(),
            category: String::new(),
            description: String::new(),
            estimated_next_episode_at: None,
            funding_url: None,
            is_subscribed: false,
            start_from_secs: 0,
            skip_last_secs: 0,
            folder_uuid: None,
            sort_position: 0,
            date_added: None,
            sync_status: SyncStatus::NotSynced,
        }
    }
}

// =============================================================================
// Episode
// =============================================================================

/// A podcast episode.
///
/// Invariant: each `*_modified` field is non-null iff the paired value has
/// diverged locally from the last known server value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Default)]
pub struct Episode {
    pub uuid: String,
    pub podcast_uuid: String,
    pub title: String,
    pub url: String,
    pub file_type: String,
    pub duration_secs: f64,
    pub size_bytes: i64,
    /// Publish time, milliseconds.
    pub published_at: i64,
    pub season: Option<i64>,
    pub number: Option<i64>,
    pub episode_type: Option<String>,

    pub playing_status: PlayingStatus,
    pub playing_status_modified: Option<i64>,
    /// Playback offset, seconds.
    pub played_up_to: f64,
    pub played_up_to_modified: Option<i64>,
    pub starred: bool,
    pub starred_modified: Option<i64>,
    pub is_archived: bool,
    pub archived_modified: Option<i64>,
    pub duration_modified: Option<i64>,

    pub episode_status: EpisodeStatus,

    /// Last playback interaction time, milliseconds. Drives history sync.
    pub last_playback_interaction: Option<i64>,
    pub interaction_sync_status: SyncStatus,
    /// The user removed this interaction from history; pending a delete-action
    /// upload.
    pub interaction_removed: bool,

    /// When the row was created locally, milliseconds.
    pub date_added: i64,
}

impl Episode {
    pub fn new(
        uuid: impl Into<String>,
        podcast_uuid: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            podcast_uuid: podcast_uuid.into(),
            title: title.into(),
            interaction_sync_status: SyncStatus::Synced,
            ..Default::default()
        }
    }

    /// Whether any field is pending upload.
    pub fn has_sync_changes(&self) -> bool {
        self.playing_status_modified.is_some()
            || self.played_up_to_modified.is_some()
            || self.starred_modified.is_some()
            || self.archived_modified.is_some()
            || self.duration_modified.is_some()
    }

    pub fn is_downloaded(&self) -> bool {
        self.episode_status == EpisodeStatus::Downloaded
    }

    /// Whether local-only cleanup may delete this episode. Download activity
    /// blocks cleanup; the currently-playing check is the caller's job via the
    /// player bridge.
    pub fn eligible_for_cleanup(&self) -> bool {
        !matches!(
            self.episode_status,
            EpisodeStatus::Queued | EpisodeStatus::Downloading
        )
    }
}

// =============================================================================
// Up-next
// =============================================================================

/// Append-only record of one local up-next queue mutation.
///
/// `uuid` holds the single affected episode for everything except
/// [`UpNextAction::Replace`], which stores the full ordered queue as a
/// comma-joined uuid list in `uuids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UpNextChange {
    /// Auto-assigned row id; 0 before insertion.
    pub id: i64,
    pub action: UpNextAction,
    pub uuid: Option<String>,
    pub uuids: Option<String>,
    /// When the mutation happened locally, milliseconds.
    pub modified: i64,
}

impl UpNextChange {
    pub fn single(action: UpNextAction, episode_uuid: impl Into<String>, modified: i64) -> Self {
        Self {
            id: 0,
            action,
            uuid: Some(episode_uuid.into()),
            uuids: None,
            modified,
        }
    }

    pub fn replace(queue: &[String], modified: i64) -> Self {
        Self {
            id: 0,
            action: UpNextAction::Replace,
            uuid: None,
            uuids: Some(queue.join(",")),
            modified,
        }
    }

    /// Expand the comma-joined uuid list of a Replace change.
    pub fn uuid_list(&self) -> Vec<String> {
        match &self.uuids {
            Some(joined) if !joined.is_empty() => {
                joined.split(',').map(|s| s.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Filter (smart playlist)
// =============================================================================

/// A server-syncable episode filter. Manual playlists are excluded from sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EpisodeFilter {
    pub uuid: String,
    pub title: String,
    pub sort_position: i32,
    pub manual: bool,
    /// Tombstone: kept locally until the deletion is acknowledged upstream.
    pub deleted: bool,
    pub sync_status: SyncStatus,
    pub unplayed: bool,
    pub partially_played: bool,
    pub finished: bool,
    pub audio_video: i32,
    pub filter_hours: i32,
}

impl EpisodeFilter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            title: title.into(),
            sort_position: 0,
            manual: false,
            deleted: false,
            sync_status: SyncStatus::NotSynced,
            unplayed: true,
            partially_played: true,
            finished: false,
            audio_video: 0,
            filter_hours: 0,
        }
    }
}

// =============================================================================
// Folder
// =============================================================================

/// A home-grid folder grouping podcasts. Syncs as a whole record; dirtiness
/// is a single `sync_modified` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub uuid: String,
    pub name: String,
    pub color: i32,
    pub sort_position: i32,
    pub podcasts_sort_type: i32,
    /// Milliseconds.
    pub date_added: i64,
    pub deleted: bool,
    /// Non-null when the folder has local changes pending upload.
    pub sync_modified: Option<i64>,
}

impl Folder {
    pub fn new(name: impl Into<String>, date_added: i64) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            name: name.into(),
            color: 0,
            sort_position: 0,
            podcasts_sort_type: 0,
            date_added,
            deleted: false,
            sync_modified: Some(date_added),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Listening history sync.
//!
//! History rides on the episode rows themselves: `last_playback_interaction`
//! is the record, `interaction_sync_status` and `interaction_removed` drive
//! the upload set. A pending "clear history" is uploaded as its own action
//! and only reset after the server acknowledges the exchange, so a failed
//! sync retries the clear instead of dropping it.

use std::sync::Arc;

use bridge_traits::sync::{history_action, HistoryChangeRecord, HistorySyncRequest, HistorySyncResponse};
use bridge_traits::{SyncClient, USER_EPISODE_PODCAST_UUID};
use core_library::models::SyncStatus;
use core_library::repositories::EpisodeRepository;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::import::{EpisodeSeed, PodcastImporter};
use crate::settings::SyncSettings;

/// Server changes are applied in batches of this size.
pub const HISTORY_CHUNK_SIZE: usize = 1000;

pub struct HistorySync {
    client: Arc<dyn SyncClient>,
    episodes: Arc<dyn EpisodeRepository>,
    importer: Arc<PodcastImporter>,
    settings: SyncSettings,
}

impl HistorySync {
    pub fn new(
        client: Arc<dyn SyncClient>,
        episodes: Arc<dyn EpisodeRepository>,
        importer: Arc<PodcastImporter>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            client,
            episodes,
            importer,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        let pending = self.episodes.find_interactions_to_sync().await?;
        let uploaded_uuids: Vec<String> = pending.iter().map(|e| e.uuid.clone()).collect();

        let mut changes: Vec<HistoryChangeRecord> = pending
            .iter()
            .map(|episode| HistoryChangeRecord {
                action: if episode.interaction_removed {
                    history_action::DELETE
                } else {
                    history_action::ADD
                },
                modified: episode.last_playback_interaction.unwrap_or(0),
                episode_uuid: Some(episode.uuid.clone()),
                podcast_uuid: Some(episode.podcast_uuid.clone()),
                title: Some(episode.title.clone()),
                url: Some(episode.url.clone()),
                published_at: Some(episode.published_at),
            })
            .collect();

        let clear_time = self.settings.clear_history_time().await?;
        if clear_time > 0 {
            changes.push(HistoryChangeRecord {
                action: history_action::CLEAR_ALL,
                modified: clear_time,
                ..Default::default()
            });
        }

        debug!(changes = changes.len(), "uploading history changes");
        let response = self
            .client
            .history_sync(HistorySyncRequest {
                device_id: self.settings.device_id().await?,
                server_modified: self.settings.history_server_modified().await?,
                changes,
            })
            .await?;

        self.apply(&response).await?;

        // Acknowledge local state only after the whole response applied, so
        // a failure re-uploads everything next cycle.
        if !uploaded_uuids.is_empty() {
            self.episodes.mark_interactions_synced(&uploaded_uuids).await?;
        }
        if clear_time > 0 {
            self.settings.set_clear_history_time(0).await?;
        }
        self.settings
            .set_history_server_modified(response.server_modified)
            .await?;
        Ok(())
    }

    async fn apply(&self, response: &HistorySyncResponse) -> Result<()> {
        if let Some(last_cleared) = response.last_cleared {
            if last_cleared > 0 {
                self.episodes.delete_interactions_before(last_cleared).await?;
            }
        }

        for chunk in response.changes.chunks(HISTORY_CHUNK_SIZE) {
            for change in chunk {
                match change.action {
                    history_action::ADD => self.apply_add(change).await?,
                    history_action::DELETE => self.apply_delete(change).await?,
                    other => {
                        debug!(action = other, "ignoring unknown history action");
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_add(&self, change: &HistoryChangeRecord) -> Result<()> {
        let Some(episode_uuid) = change.episode_uuid.as_deref() else {
            return Ok(());
        };

        let episode = match self.episodes.find_by_uuid(episode_uuid).await? {
            Some(existing) => Some(existing),
            None => {
                let Some(podcast_uuid) = change.podcast_uuid.as_deref() else {
                    return Ok(());
                };
                if podcast_uuid == USER_EPISODE_PODCAST_UUID {
                    return Ok(());
                }
                let seed = EpisodeSeed {
                    title: change.title.as_deref(),
                    url: change.url.as_deref(),
                    published_at: change.published_at,
                };
                match self
                    .importer
                    .resolve_reference(podcast_uuid, episode_uuid, seed)
                    .await
                {
                    Ok(found) => found,
                    Err(error) => {
                        warn!(episode = episode_uuid, %error, "failed to import history episode");
                        None
                    }
                }
            }
        };
        let Some(mut episode) = episode else {
            return Ok(());
        };

        // Server history only moves an interaction forward in time.
        if change.modified > episode.last_playback_interaction.unwrap_or(0) {
            episode.last_playback_interaction = Some(change.modified);
            episode.interaction_sync_status = SyncStatus::Synced;
            episode.interaction_removed = false;
            self.episodes.update(&episode).await?;
        }
        Ok(())
    }

    async fn apply_delete(&self, change: &HistoryChangeRecord) -> Result<()> {
        let Some(episode_uuid) = change.episode_uuid.as_deref() else {
            return Ok(());
        };
        if let Some(mut episode) = self.episodes.find_by_uuid(episode_uuid).await? {
            if episode.last_playback_interaction.is_some() {
                episode.last_playback_interaction = None;
                episode.interaction_sync_status = SyncStatus::Synced;
                episode.interaction_removed = false;
                self.episodes.update(&episode).await?;
            }
        }
        Ok(())
    }
}

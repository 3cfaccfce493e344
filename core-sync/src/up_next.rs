//! Up-next queue sync.
//!
//! The queue syncs as an append-only change log: every local mutation is
//! buffered, the whole buffer is uploaded each cycle, and the server replies
//! with the authoritative queue (or `304 Not Modified`). Episode metadata is
//! resolved at send time, not when the change is logged, so a change recorded
//! for an episode that was deleted later still uploads with just its uuid.

use std::sync::Arc;

use bridge_traits::sync::{
    UpNextChangeRecord, UpNextEpisodeRecord, UpNextSyncRequest, UpNextSyncResponse,
};
use bridge_traits::{
    Clock, PlayerBridge, SyncClient, UserEpisodeBridge, USER_EPISODE_PODCAST_UUID,
};
use bytes::Bytes;
use core_library::models::{UpNextAction, UpNextChange};
use core_library::repositories::{EpisodeRepository, UpNextRepository};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::import::{EpisodeSeed, PodcastImporter};
use crate::settings::SyncSettings;

/// Wire codec for the up-next exchange. The server negotiates the payload
/// format by content type; the engine only deals in the logical request and
/// response shapes.
pub trait UpNextCodec: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn encode(&self, request: &UpNextSyncRequest) -> Result<Bytes>;

    fn decode(&self, body: &[u8]) -> Result<UpNextSyncResponse>;
}

/// JSON payload codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonUpNextCodec;

impl UpNextCodec for JsonUpNextCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, request: &UpNextSyncRequest) -> Result<Bytes> {
        let body = serde_json::to_vec(request).map_err(|e| SyncError::Codec(e.to_string()))?;
        Ok(Bytes::from(body))
    }

    fn decode(&self, body: &[u8]) -> Result<UpNextSyncResponse> {
        serde_json::from_slice(body).map_err(|e| SyncError::Codec(e.to_string()))
    }
}

pub struct UpNextSync {
    client: Arc<dyn SyncClient>,
    codec: Arc<dyn UpNextCodec>,
    up_next: Arc<dyn UpNextRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    importer: Arc<PodcastImporter>,
    user_episodes: Arc<dyn UserEpisodeBridge>,
    player: Arc<dyn PlayerBridge>,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
}

impl UpNextSync {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn SyncClient>,
        codec: Arc<dyn UpNextCodec>,
        up_next: Arc<dyn UpNextRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        importer: Arc<PodcastImporter>,
        user_episodes: Arc<dyn UserEpisodeBridge>,
        player: Arc<dyn PlayerBridge>,
        settings: SyncSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            codec,
            up_next,
            episodes,
            importer,
            user_episodes,
            player,
            settings,
            clock,
        }
    }

    /// One up-next exchange: upload the buffered change log, apply the
    /// server's queue, drain acknowledged changes.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        let changes = self.up_next.changes().await?;
        let uploaded_watermark = changes.last().map(|change| change.modified);

        let mut records = Vec::with_capacity(changes.len());
        for change in &changes {
            records.push(self.change_record(change).await?);
        }

        let request = UpNextSyncRequest {
            device_id: self.settings.device_id().await?,
            server_modified: self.settings.up_next_server_modified().await?,
            changes: records,
        };
        let body = self.codec.encode(&request)?;
        let Some(response_body) = self
            .client
            .up_next_sync(body, self.codec.content_type())
            .await?
        else {
            debug!("up-next unchanged on the server");
            return Ok(());
        };
        let response = self.codec.decode(&response_body)?;

        let local_queue = self.up_next.queue_uuids().await?;
        if request.server_modified == 0 && response.episodes.is_empty() && !local_queue.is_empty()
        {
            // First exchange for this account. An empty server queue must not
            // wipe a queue built before login; re-log it so the next cycle
            // pushes it up instead.
            info!(queued = local_queue.len(), "keeping pre-login queue over empty server queue");
            if let Some(watermark) = uploaded_watermark {
                self.up_next.delete_changes_up_to(watermark).await?;
            }
            self.up_next
                .add_change(&UpNextChange::replace(&local_queue, self.clock.now_millis()))
                .await?;
            self.settings
                .set_up_next_server_modified(response.server_modified)
                .await?;
            return Ok(());
        }

        let server_queue: Vec<String> =
            response.episodes.iter().map(|e| e.uuid.clone()).collect();
        if server_queue != local_queue {
            self.import_missing(&response.episodes).await?;
            self.up_next.replace_queue(&server_queue).await?;
            self.player.on_queue_imported().await;
            debug!(episodes = server_queue.len(), "imported server up-next queue");
        }

        self.settings
            .set_up_next_server_modified(response.server_modified)
            .await?;
        if let Some(watermark) = uploaded_watermark {
            self.up_next.delete_changes_up_to(watermark).await?;
        }
        Ok(())
    }

    async fn change_record(&self, change: &UpNextChange) -> Result<UpNextChangeRecord> {
        let record = if change.action == UpNextAction::Replace {
            let mut episodes = Vec::new();
            for uuid in change.uuid_list() {
                episodes.push(self.episode_record(&uuid).await?);
            }
            UpNextChangeRecord {
                action: change.action as i32,
                modified: change.modified,
                episode: None,
                episodes: Some(episodes),
            }
        } else {
            let uuid = change.uuid.as_deref().unwrap_or_default();
            UpNextChangeRecord {
                action: change.action as i32,
                modified: change.modified,
                episode: Some(self.episode_record(uuid).await?),
                episodes: None,
            }
        };
        Ok(record)
    }

    async fn episode_record(&self, uuid: &str) -> Result<UpNextEpisodeRecord> {
        Ok(match self.episodes.find_by_uuid(uuid).await? {
            Some(episode) => UpNextEpisodeRecord {
                uuid: episode.uuid,
                title: Some(episode.title),
                url: Some(episode.url),
                podcast_uuid: Some(episode.podcast_uuid),
                published_at: Some(episode.published_at),
            },
            None => UpNextEpisodeRecord {
                uuid: uuid.to_string(),
                ..Default::default()
            },
        })
    }

    /// Materialise queue entries the device has never seen. Failures are
    /// logged and skipped; the queue still references the uuid and the row
    /// can appear later.
    async fn import_missing(&self, episodes: &[UpNextEpisodeRecord]) -> Result<()> {
        for record in episodes {
            if self.episodes.find_by_uuid(&record.uuid).await?.is_some() {
                continue;
            }
            let podcast_uuid = record
                .podcast_uuid
                .as_deref()
                .unwrap_or(USER_EPISODE_PODCAST_UUID);

            if podcast_uuid == USER_EPISODE_PODCAST_UUID {
                if let Err(error) = self.user_episodes.download_missing(&record.uuid).await {
                    warn!(episode = %record.uuid, %error, "failed to fetch user episode for the queue");
                }
                continue;
            }

            let seed = EpisodeSeed {
                title: record.title.as_deref(),
                url: record.url.as_deref(),
                published_at: record.published_at,
            };
            match self
                .importer
                .resolve_reference(podcast_uuid, &record.uuid, seed)
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(episode = %record.uuid, "queue entry could not be resolved");
                }
                Err(error) => {
                    warn!(episode = %record.uuid, %error, "failed to import queue entry");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_round_trips_requests() {
        let codec = JsonUpNextCodec;
        let request = UpNextSyncRequest {
            device_id: "dev-1".to_string(),
            server_modified: 99,
            changes: vec![UpNextChangeRecord {
                action: UpNextAction::PlayNext as i32,
                modified: 1_000,
                episode: Some(UpNextEpisodeRecord {
                    uuid: "e1".to_string(),
                    title: Some("Pilot".to_string()),
                    ..Default::default()
                }),
                episodes: None,
            }],
        };

        let body = codec.encode(&request).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["server_modified"], 99);
        assert_eq!(value["changes"][0]["action"], 2);
        // Unused variant arms stay off the wire.
        assert!(value["changes"][0].get("episodes").is_none());
    }

    #[test]
    fn json_codec_decodes_server_queue() {
        let codec = JsonUpNextCodec;
        let response = codec
            .decode(br#"{"server_modified":123,"episodes":[{"uuid":"a"},{"uuid":"b"}]}"#)
            .unwrap();
        assert_eq!(response.server_modified, 123);
        assert_eq!(
            response.episodes.iter().map(|e| e.uuid.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn malformed_payload_is_a_codec_error() {
        let codec = JsonUpNextCodec;
        assert!(matches!(
            codec.decode(b"not json"),
            Err(SyncError::Codec(_))
        ));
    }
}

//! Starred episode sync.
//!
//! The server returns the account's full starred list; the device only
//! processes entries changed recently or since its watermark, imports
//! whatever it is missing, and lets a newer local star win over a stale
//! server entry.

use std::sync::Arc;

use bridge_traits::sync::StarredEpisode;
use bridge_traits::{Clock, SyncClient, USER_EPISODE_PODCAST_UUID};
use core_library::repositories::EpisodeRepository;
use core_library::Episode;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::import::{EpisodeSeed, PodcastImporter};
use crate::settings::SyncSettings;

/// Entries changed within this window are always re-processed, covering
/// server entries that landed while this device's watermark was ahead.
pub const STARRED_REPLAY_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub struct StarredSync {
    client: Arc<dyn SyncClient>,
    episodes: Arc<dyn EpisodeRepository>,
    importer: Arc<PodcastImporter>,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
}

impl StarredSync {
    pub fn new(
        client: Arc<dyn SyncClient>,
        episodes: Arc<dyn EpisodeRepository>,
        importer: Arc<PodcastImporter>,
        settings: SyncSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            episodes,
            importer,
            settings,
            clock,
        }
    }

    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        let server_episodes = self.client.starred_episodes().await?;
        self.process(server_episodes).await
    }

    pub(crate) async fn process(&self, server_episodes: Vec<StarredEpisode>) -> Result<()> {
        let watermark = self.settings.starred_server_modified().await?;
        let window_start = self.clock.now_millis() - STARRED_REPLAY_WINDOW_MS;
        let mut max_seen = watermark;

        for entry in server_episodes {
            if entry.starred_modified <= watermark && entry.starred_modified < window_start {
                continue;
            }

            if let Some(episode) = self.resolve(&entry).await? {
                self.apply(episode, &entry).await?;
            }
            max_seen = max_seen.max(entry.starred_modified);
        }

        if max_seen > watermark {
            self.settings.set_starred_server_modified(max_seen).await?;
        }
        Ok(())
    }

    /// Import podcast and episode rows for a starred entry the device lacks.
    /// Unresolvable entries are skipped silently; they stay on the server and
    /// can resolve on a later pass.
    async fn resolve(&self, entry: &StarredEpisode) -> Result<Option<Episode>> {
        if entry.podcast_uuid == USER_EPISODE_PODCAST_UUID {
            return Ok(self.episodes.find_by_uuid(&entry.uuid).await?);
        }
        match self
            .importer
            .resolve_reference(&entry.podcast_uuid, &entry.uuid, EpisodeSeed::default())
            .await
        {
            Ok(found) => Ok(found),
            Err(error) => {
                debug!(episode = %entry.uuid, %error, "starred episode could not be resolved");
                Ok(None)
            }
        }
    }

    async fn apply(&self, mut episode: Episode, entry: &StarredEpisode) -> Result<()> {
        // A local star stamped at or after the server's change wins; it is
        // still dirty and uploads on the next incremental pass.
        let local_modified = episode.starred_modified.unwrap_or(0);
        if entry.starred_modified <= local_modified {
            return Ok(());
        }
        if episode.starred != entry.starred || episode.starred_modified.is_some() {
            episode.starred = entry.starred;
            episode.starred_modified = None;
            self.episodes.update(&episode).await?;
        }
        Ok(())
    }
}

//! Account sync pipeline.
//!
//! One [`SyncCoordinator::run`] call performs a complete account sync: the
//! podcast/episode/filter/folder exchange (full on first run, incremental
//! after), then the up-next, user-episode, starred and history stages in
//! order. Stages run sequentially; the first failing stage aborts the run and
//! nothing it had not acknowledged is lost, because every cursor and
//! watermark is persisted only after its stage succeeds.

use std::collections::HashSet;
use std::sync::Arc;

use bridge_traits::sync::{
    EpisodeDelta, EpisodeRecord, FilterDelta, FilterRecord, FolderDelta, FolderRecord,
    PodcastDelta, PodcastRecord, SyncUpdateRequest, SyncUpdateResponse, UploadRecord,
};
use bridge_traits::{Clock, PlayerBridge, SyncClient, UserEpisodeBridge, USER_EPISODE_PODCAST_UUID};
use core_library::models::{Episode, EpisodeFilter, Folder, Podcast, SyncStatus};
use core_library::repositories::{
    EpisodeRepository, FilterRepository, FolderRepository, PodcastRepository,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::history::HistorySync;
use crate::import::{EpisodeSeed, PodcastImporter};
use crate::merge;
use crate::settings::SyncSettings;
use crate::starred::StarredSync;
use crate::up_next::UpNextSync;

/// How many podcasts are imported in parallel during a home-grid import.
const SUBSCRIBE_CONCURRENCY: usize = 5;

/// What a sync run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All stages completed.
    Synced,
    /// No account is signed in; nothing was touched.
    NotLoggedIn,
}

pub struct SyncCoordinator {
    client: Arc<dyn SyncClient>,
    settings: SyncSettings,
    podcasts: Arc<dyn PodcastRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    filters: Arc<dyn FilterRepository>,
    folders: Arc<dyn FolderRepository>,
    importer: Arc<PodcastImporter>,
    up_next: UpNextSync,
    starred: StarredSync,
    history: HistorySync,
    user_episodes: Arc<dyn UserEpisodeBridge>,
    player: Arc<dyn PlayerBridge>,
    clock: Arc<dyn Clock>,
}

impl SyncCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn SyncClient>,
        settings: SyncSettings,
        podcasts: Arc<dyn PodcastRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        filters: Arc<dyn FilterRepository>,
        folders: Arc<dyn FolderRepository>,
        importer: Arc<PodcastImporter>,
        up_next: UpNextSync,
        starred: StarredSync,
        history: HistorySync,
        user_episodes: Arc<dyn UserEpisodeBridge>,
        player: Arc<dyn PlayerBridge>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            settings,
            podcasts,
            episodes,
            filters,
            folders,
            importer,
            up_next,
            starred,
            history,
            user_episodes,
            player,
            clock,
        }
    }

    /// Run a complete account sync.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncOutcome> {
        if !self.client.is_logged_in().await {
            debug!("no account signed in, skipping sync");
            return Ok(SyncOutcome::NotLoggedIn);
        }

        match self.settings.last_modified().await? {
            None => self.full_sync().await?,
            Some(cursor) => {
                if self.settings.home_grid_needs_refresh().await? {
                    self.refresh_home_grid().await?;
                }
                self.incremental_sync(&cursor).await?;
            }
        }

        self.up_next.sync().await?;
        self.user_episodes.sync_all().await?;
        self.starred.sync().await?;
        self.history.sync().await?;

        info!("sync complete");
        Ok(SyncOutcome::Synced)
    }

    /// First sync after sign-in: pull the whole account down.
    async fn full_sync(&self) -> Result<()> {
        info!("running first full sync");
        // Grab the server timestamp before importing so changes that land
        // during the import are still covered by the first incremental pass.
        let cursor = self.client.last_sync_at().await?;
        self.import_home_folder().await?;
        self.import_filters().await?;
        self.settings.set_last_modified(&cursor).await?;
        Ok(())
    }

    /// Re-import the home grid on demand and force a full reconcile upload.
    async fn refresh_home_grid(&self) -> Result<()> {
        info!("re-importing home grid");
        self.import_home_folder().await?;
        self.podcasts.mark_all_unsynced().await?;
        self.settings.set_home_grid_needs_refresh(false).await?;
        Ok(())
    }

    async fn import_home_folder(&self) -> Result<()> {
        let home = self.client.home_folder().await?;

        // Folders first: podcasts reference them.
        for folder in &home.folders {
            self.apply_folder_delta(folder).await?;
        }

        let server_uuids: HashSet<&str> =
            home.podcasts.iter().map(|p| p.uuid.as_str()).collect();
        let local_uuids: HashSet<String> =
            self.podcasts.subscribed_uuids().await?.into_iter().collect();

        // Subscribed locally but absent from the server grid: re-upload so
        // the server learns about the subscription.
        for uuid in &local_uuids {
            if !server_uuids.contains(uuid.as_str()) {
                if let Some(mut podcast) = self.podcasts.find_by_uuid(uuid).await? {
                    podcast.sync_status = SyncStatus::NotSynced;
                    self.podcasts.update(&podcast).await?;
                }
            }
        }

        let (known, missing): (Vec<&PodcastDelta>, Vec<&PodcastDelta>) = home
            .podcasts
            .iter()
            .partition(|delta| local_uuids.contains(delta.uuid.as_str()));

        for delta in known {
            if let Some(mut podcast) = self.podcasts.find_by_uuid(&delta.uuid).await? {
                if merge::reconcile_podcast(&mut podcast, delta) {
                    self.podcasts.update(&podcast).await?;
                }
            }
        }

        // Per-podcast import failures are logged and skipped; the next sync
        // gets another chance.
        stream::iter(missing)
            .for_each_concurrent(SUBSCRIBE_CONCURRENCY, |delta| async move {
                match self.importer.import_podcast(&delta.uuid, true).await {
                    Ok(mut podcast) => {
                        if merge::reconcile_podcast(&mut podcast, delta) {
                            if let Err(error) = self.podcasts.update(&podcast).await {
                                warn!(podcast = %delta.uuid, %error, "failed to store imported podcast settings");
                            }
                        }
                    }
                    Err(error) => {
                        warn!(podcast = %delta.uuid, %error, "failed to import podcast");
                    }
                }
            })
            .await;
        Ok(())
    }

    async fn import_filters(&self) -> Result<()> {
        for delta in self.client.filters().await? {
            self.apply_filter_delta(&delta).await?;
        }
        Ok(())
    }

    /// One incremental exchange: upload everything dirty, apply the server
    /// delta, then acknowledge and advance the cursor.
    async fn incremental_sync(&self, cursor: &str) -> Result<()> {
        let dirty_podcasts = self.podcasts.find_to_sync().await?;
        let dirty_episodes = self.episodes.find_to_sync().await?;
        let dirty_filters = self.filters.find_to_sync().await?;
        let dirty_folders = self.folders.find_to_sync().await?;

        let uploaded_episode_uuids: Vec<String> =
            dirty_episodes.iter().map(|e| e.uuid.clone()).collect();
        // Dirty timestamps stamped after this point belong to edits made
        // while the request is in flight and must stay dirty.
        let upload_cutoff = self.clock.now_millis();

        let mut records = Vec::new();
        records.extend(
            dirty_podcasts
                .iter()
                .map(|p| UploadRecord::Podcast(podcast_record(p))),
        );
        records.extend(
            dirty_episodes
                .iter()
                .map(|e| UploadRecord::Episode(episode_record(e))),
        );
        records.extend(
            dirty_filters
                .iter()
                .map(|f| UploadRecord::Filter(filter_record(f))),
        );
        records.extend(
            dirty_folders
                .iter()
                .map(|f| UploadRecord::Folder(folder_record(f))),
        );
        records.push(UploadRecord::Device(self.settings.device_stats().await?));

        debug!(records = records.len(), cursor, "uploading incremental changes");
        let response = self
            .client
            .sync_update(SyncUpdateRequest {
                device_id: self.settings.device_id().await?,
                last_modified: cursor.to_string(),
                records,
            })
            .await?;

        self.apply_update(&response).await?;

        for uuid in &uploaded_episode_uuids {
            self.episodes.clear_dirty_up_to(uuid, upload_cutoff).await?;
        }
        self.podcasts.mark_all_synced().await?;
        self.filters.mark_all_synced().await?;
        self.folders.mark_all_synced().await?;

        if let Some(new_cursor) = &response.last_modified {
            self.settings.set_last_modified(new_cursor).await?;
        }
        Ok(())
    }

    async fn apply_update(&self, response: &SyncUpdateResponse) -> Result<()> {
        for delta in &response.episodes {
            self.apply_episode_delta(delta).await?;
        }
        for delta in &response.podcasts {
            self.apply_podcast_delta(delta).await?;
        }
        for delta in &response.filters {
            self.apply_filter_delta(delta).await?;
        }
        for delta in &response.folders {
            self.apply_folder_delta(delta).await?;
        }
        for setting in &response.device_settings {
            self.settings
                .apply_server_setting(&setting.key, &setting.value)
                .await?;
        }
        if let Some(stats) = &response.stats {
            self.settings.cache_server_stats(stats).await?;
        }
        Ok(())
    }

    async fn apply_episode_delta(&self, delta: &EpisodeDelta) -> Result<()> {
        let episode = match self.episodes.find_by_uuid(&delta.uuid).await? {
            Some(existing) => Some(existing),
            None => {
                let Some(podcast_uuid) = delta.podcast_uuid.as_deref() else {
                    debug!(episode = %delta.uuid, "server episode without a podcast, skipping");
                    return Ok(());
                };
                if podcast_uuid == USER_EPISODE_PODCAST_UUID {
                    return Ok(());
                }
                let seed = EpisodeSeed {
                    title: delta.title.as_deref(),
                    url: delta.url.as_deref(),
                    published_at: delta.published_at,
                };
                match self
                    .importer
                    .resolve_reference(podcast_uuid, &delta.uuid, seed)
                    .await
                {
                    Ok(found) => found,
                    Err(error) => {
                        warn!(episode = %delta.uuid, %error, "failed to import episode from delta");
                        None
                    }
                }
            }
        };
        let Some(mut episode) = episode else {
            return Ok(());
        };

        let outcome = merge::apply_episode_delta(
            &mut episode,
            delta,
            self.player.as_ref(),
            self.clock.as_ref(),
        )
        .await;
        if outcome.changed {
            self.episodes.update(&episode).await?;
        }
        if let Some(position) = outcome.seek_to {
            self.player.seek_to(&episode.uuid, position).await;
        }
        Ok(())
    }

    async fn apply_podcast_delta(&self, delta: &PodcastDelta) -> Result<()> {
        match self.podcasts.find_by_uuid(&delta.uuid).await? {
            Some(mut podcast) => {
                let mut changed = merge::reconcile_podcast(&mut podcast, delta);
                if podcast.is_subscribed != delta.is_subscribed {
                    podcast.is_subscribed = delta.is_subscribed;
                    podcast.sync_status = SyncStatus::Synced;
                    changed = true;
                }
                if changed {
                    self.podcasts.update(&podcast).await?;
                }
            }
            None if delta.is_subscribed => {
                match self.importer.import_podcast(&delta.uuid, true).await {
                    Ok(mut podcast) => {
                        if merge::reconcile_podcast(&mut podcast, delta) {
                            self.podcasts.update(&podcast).await?;
                        }
                    }
                    Err(error) => {
                        warn!(podcast = %delta.uuid, %error, "failed to import podcast from delta");
                    }
                }
            }
            // An unsubscribe for a podcast the device never had is a no-op.
            None => {}
        }
        Ok(())
    }

    async fn apply_filter_delta(&self, delta: &FilterDelta) -> Result<()> {
        if delta.deleted {
            self.filters.delete(&delta.uuid).await?;
            return Ok(());
        }
        match self.filters.find_by_uuid(&delta.uuid).await? {
            Some(mut filter) => {
                apply_filter_fields(&mut filter, delta);
                self.filters.update(&filter).await?;
            }
            None => {
                self.filters.insert(&filter_from_delta(delta)).await?;
            }
        }
        Ok(())
    }

    async fn apply_folder_delta(&self, delta: &FolderDelta) -> Result<()> {
        if delta.deleted {
            self.folders.delete(&delta.uuid).await?;
            return Ok(());
        }
        self.folders
            .upsert(&Folder {
                uuid: delta.uuid.clone(),
                name: delta.name.clone(),
                color: delta.color,
                sort_position: delta.sort_position,
                podcasts_sort_type: delta.podcasts_sort_type,
                date_added: delta.date_added,
                deleted: false,
                sync_modified: None,
            })
            .await?;
        Ok(())
    }
}

fn podcast_record(podcast: &Podcast) -> PodcastRecord {
    PodcastRecord {
        uuid: podcast.uuid.clone(),
        is_subscribed: podcast.is_subscribed,
        start_from_secs: Some(podcast.start_from_secs),
        skip_last_secs: Some(podcast.skip_last_secs),
        folder_uuid: podcast.folder_uuid.clone(),
        sort_position: Some(podcast.sort_position),
        date_added: podcast.date_added,
    }
}

/// Build an episode upload record carrying only the dirty fields, each with
/// the timestamp of its local change.
fn episode_record(episode: &Episode) -> EpisodeRecord {
    let mut record = EpisodeRecord {
        uuid: episode.uuid.clone(),
        podcast_uuid: episode.podcast_uuid.clone(),
        ..Default::default()
    };
    if let Some(modified) = episode.playing_status_modified {
        record.playing_status = Some(episode.playing_status.as_i32());
        record.playing_status_modified = Some(modified);
    }
    if let Some(modified) = episode.played_up_to_modified {
        record.played_up_to = Some(episode.played_up_to);
        record.played_up_to_modified = Some(modified);
    }
    if let Some(modified) = episode.starred_modified {
        record.starred = Some(episode.starred);
        record.starred_modified = Some(modified);
    }
    if let Some(modified) = episode.archived_modified {
        record.is_archived = Some(episode.is_archived);
        record.archived_modified = Some(modified);
    }
    if let Some(modified) = episode.duration_modified {
        record.duration = Some(episode.duration_secs);
        record.duration_modified = Some(modified);
    }
    record
}

fn filter_record(filter: &EpisodeFilter) -> FilterRecord {
    FilterRecord {
        uuid: filter.uuid.clone(),
        title: filter.title.clone(),
        sort_position: filter.sort_position,
        deleted: filter.deleted,
        unplayed: filter.unplayed,
        partially_played: filter.partially_played,
        finished: filter.finished,
        audio_video: filter.audio_video,
        filter_hours: filter.filter_hours,
    }
}

fn folder_record(folder: &Folder) -> FolderRecord {
    FolderRecord {
        uuid: folder.uuid.clone(),
        name: folder.name.clone(),
        color: folder.color,
        sort_position: folder.sort_position,
        podcasts_sort_type: folder.podcasts_sort_type,
        date_added: folder.date_added,
        deleted: folder.deleted,
    }
}

fn apply_filter_fields(filter: &mut EpisodeFilter, delta: &FilterDelta) {
    filter.title = delta.title.clone();
    filter.sort_position = delta.sort_position;
    filter.deleted = false;
    filter.sync_status = SyncStatus::Synced;
    filter.unplayed = delta.unplayed;
    filter.partially_played = delta.partially_played;
    filter.finished = delta.finished;
    filter.audio_video = delta.audio_video;
    filter.filter_hours = delta.filter_hours;
}

fn filter_from_delta(delta: &FilterDelta) -> EpisodeFilter {
    EpisodeFilter {
        uuid: delta.uuid.clone(),
        title: delta.title.clone(),
        sort_position: delta.sort_position,
        manual: false,
        deleted: false,
        sync_status: SyncStatus::Synced,
        unplayed: delta.unplayed,
        partially_played: delta.partially_played,
        finished: delta.finished,
        audio_video: delta.audio_video,
        filter_hours: delta.filter_hours,
    }
}

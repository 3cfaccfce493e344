//! On-demand import of server-referenced podcasts and episodes.
//!
//! Several sync stages run into uuids the device has never seen: a queue
//! entry from another device, a starred episode, a history record. They all
//! funnel through [`PodcastImporter`], which materialises the podcast row
//! (and its feed episodes) and falls back to a skeleton episode built from
//! server-provided metadata when the feed cannot resolve the uuid.

use std::sync::Arc;

use bridge_traits::feed::{EpisodeFeed, PodcastFeed};
use bridge_traits::{Clock, FeedService, USER_EPISODE_PODCAST_UUID};
use core_library::models::SyncStatus;
use core_library::repositories::{EpisodeRepository, PodcastRepository};
use core_library::{Episode, Podcast};
use tracing::{debug, instrument};

use crate::error::{Result, SyncError};

/// Server-provided metadata used to build a skeleton episode when the feed
/// has no record of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpisodeSeed<'a> {
    pub title: Option<&'a str>,
    pub url: Option<&'a str>,
    pub published_at: Option<i64>,
}

pub struct PodcastImporter {
    feeds: Arc<dyn FeedService>,
    podcasts: Arc<dyn PodcastRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    clock: Arc<dyn Clock>,
}

impl PodcastImporter {
    pub fn new(
        feeds: Arc<dyn FeedService>,
        podcasts: Arc<dyn PodcastRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feeds,
            podcasts,
            episodes,
            clock,
        }
    }

    /// Make sure a podcast exists locally, fetching its feed if needed.
    /// `subscribed` upgrades an existing unsubscribed row.
    #[instrument(skip(self))]
    pub async fn import_podcast(&self, uuid: &str, subscribed: bool) -> Result<Podcast> {
        if uuid == USER_EPISODE_PODCAST_UUID {
            return Err(SyncError::InvalidData(
                "the user-episode placeholder podcast cannot be imported".to_string(),
            ));
        }

        if let Some(mut existing) = self.podcasts.find_by_uuid(uuid).await? {
            if subscribed && !existing.is_subscribed {
                existing.is_subscribed = true;
                existing.sync_status = SyncStatus::Synced;
                self.podcasts.update(&existing).await?;
            }
            return Ok(existing);
        }

        let feed = self.feeds.podcast_feed(uuid).await?;
        let now = self.clock.now_millis();
        let podcast = podcast_from_feed(&feed, subscribed, now);
        self.podcasts.insert(&podcast).await?;

        for episode_feed in &feed.episodes {
            if self.episodes.find_by_uuid(&episode_feed.uuid).await?.is_none() {
                self.episodes
                    .insert(&episode_from_feed(uuid, episode_feed, now))
                    .await?;
            }
        }

        debug!(podcast = uuid, episodes = feed.episodes.len(), "imported podcast");
        Ok(podcast)
    }

    /// Make sure an episode exists locally, fetching its metadata on demand.
    /// `Ok(None)` when the feed service has no record of it either.
    pub async fn ensure_episode(
        &self,
        podcast_uuid: &str,
        episode_uuid: &str,
    ) -> Result<Option<Episode>> {
        if let Some(existing) = self.episodes.find_by_uuid(episode_uuid).await? {
            return Ok(Some(existing));
        }
        let Some(feed) = self.feeds.episode(podcast_uuid, episode_uuid).await? else {
            debug!(episode = episode_uuid, "episode unknown to the feed service");
            return Ok(None);
        };
        let episode = episode_from_feed(podcast_uuid, &feed, self.clock.now_millis());
        self.episodes.insert(&episode).await?;
        Ok(Some(episode))
    }

    /// Resolve a server episode reference end to end: import the podcast if
    /// missing, import the episode if missing, and as a last resort build a
    /// skeleton row from `seed`. `Ok(None)` when nothing could be created.
    pub async fn resolve_reference(
        &self,
        podcast_uuid: &str,
        episode_uuid: &str,
        seed: EpisodeSeed<'_>,
    ) -> Result<Option<Episode>> {
        if let Some(existing) = self.episodes.find_by_uuid(episode_uuid).await? {
            return Ok(Some(existing));
        }
        if podcast_uuid == USER_EPISODE_PODCAST_UUID {
            return Ok(None);
        }

        if self.podcasts.find_by_uuid(podcast_uuid).await?.is_none() {
            self.import_podcast(podcast_uuid, false).await?;
            // The feed import may already have brought the episode in.
            if let Some(existing) = self.episodes.find_by_uuid(episode_uuid).await? {
                return Ok(Some(existing));
            }
        }

        if let Some(found) = self.ensure_episode(podcast_uuid, episode_uuid).await? {
            return Ok(Some(found));
        }

        let Some(title) = seed.title else {
            return Ok(None);
        };
        let mut episode = Episode::new(episode_uuid, podcast_uuid, title);
        episode.url = seed.url.unwrap_or_default().to_string();
        episode.published_at = seed.published_at.unwrap_or_default();
        episode.date_added = self.clock.now_millis();
        self.episodes.insert(&episode).await?;
        debug!(episode = episode_uuid, "created skeleton episode from server metadata");
        Ok(Some(episode))
    }
}

fn podcast_from_feed(feed: &PodcastFeed, subscribed: bool, now: i64) -> Podcast {
    let mut podcast = Podcast::new(feed.uuid.clone(), feed.title.clone());
    podcast.author = feed.author.clone();
    podcast.category = feed.category.clone();
    podcast.description = feed.description.clone();
    podcast.estimated_next_episode_at = feed.estimated_next_episode_at;
    podcast.funding_url = feed.funding_url.clone();
    podcast.is_subscribed = subscribed;
    podcast.date_added = Some(now);
    podcast.sync_status = SyncStatus::Synced;
    podcast
}

pub(crate) fn episode_from_feed(podcast_uuid: &str, feed: &EpisodeFeed, now: i64) -> Episode {
    let mut episode = Episode::new(feed.uuid.clone(), podcast_uuid, feed.title.clone());
    episode.url = feed.url.clone();
    episode.file_type = feed.file_type.clone();
    episode.duration_secs = feed.duration_secs;
    episode.size_bytes = feed.size_bytes;
    episode.published_at = feed.published_at;
    episode.season = feed.season;
    episode.number = feed.number;
    episode.episode_type = feed.episode_type.clone();
    episode.date_added = now;
    episode
}

//! Feed-driven podcast refresh.
//!
//! Refresh keeps the local catalogue aligned with what feeds currently
//! publish: feed-owned podcast fields are overwritten, episode metadata is
//! merged without touching user state, back-catalogue episodes appear
//! pre-archived, and episodes the feed dropped are eventually deleted.
//! Refresh never produces sync uploads; everything here is local-only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bridge_traits::feed::EpisodeFeed;
use bridge_traits::{Clock, FeedService, PlayerBridge};
use core_library::repositories::{EpisodeRepository, FilterRepository, PodcastRepository};
use core_library::{Episode, Podcast};
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::import::episode_from_feed;

/// Episodes published this far before the newest known episode arrive
/// pre-archived, so importing a back catalogue does not flood the inbox.
pub const BACKDATE_ARCHIVE_THRESHOLD_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Episodes the feed no longer lists are kept this long before cleanup.
pub const ABSENT_EPISODE_RETENTION_MS: i64 = 14 * 24 * 60 * 60 * 1000;

pub struct PodcastRefresher {
    feeds: Arc<dyn FeedService>,
    podcasts: Arc<dyn PodcastRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    filters: Arc<dyn FilterRepository>,
    player: Arc<dyn PlayerBridge>,
    clock: Arc<dyn Clock>,
}

impl PodcastRefresher {
    pub fn new(
        feeds: Arc<dyn FeedService>,
        podcasts: Arc<dyn PodcastRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        filters: Arc<dyn FilterRepository>,
        player: Arc<dyn PlayerBridge>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feeds,
            podcasts,
            episodes,
            filters,
            player,
            clock,
        }
    }

    /// Refresh every subscribed podcast. Per-podcast failures are logged and
    /// skipped so one broken feed cannot stall the rest.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<()> {
        for uuid in self.podcasts.subscribed_uuids().await? {
            if let Err(error) = self.refresh_podcast(&uuid).await {
                warn!(podcast = %uuid, %error, "podcast refresh failed");
            }
        }
        Ok(())
    }

    /// Refresh one podcast from its feed snapshot.
    pub async fn refresh_podcast(&self, podcast_uuid: &str) -> Result<()> {
        let Some(podcast) = self.podcasts.find_by_uuid(podcast_uuid).await? else {
            debug!(podcast = podcast_uuid, "refresh requested for unknown podcast");
            return Ok(());
        };
        let feed = self.feeds.podcast_feed(podcast_uuid).await?;

        let mut updated = podcast.clone();
        updated.title = feed.title.clone();
        updated.author = feed.author.clone();
        updated.category = feed.category.clone();
        updated.description = feed.description.clone();
        updated.estimated_next_episode_at = feed.estimated_next_episode_at;
        updated.funding_url = feed.funding_url.clone();
        if updated != podcast {
            self.podcasts.update(&updated).await?;
        }

        let latest_known = self.episodes.latest_published_at(podcast_uuid).await?;
        let local_episodes = self.episodes.episodes_for_podcast(podcast_uuid).await?;
        let local_by_uuid: HashMap<&str, &Episode> = local_episodes
            .iter()
            .map(|episode| (episode.uuid.as_str(), episode))
            .collect();

        for episode_feed in &feed.episodes {
            match local_by_uuid.get(episode_feed.uuid.as_str()) {
                Some(existing) => {
                    let mut merged = (*existing).clone();
                    merge_feed_fields(&mut merged, episode_feed);
                    if &merged != *existing {
                        self.episodes.update(&merged).await?;
                    }
                }
                None => {
                    if should_insert(&podcast, episode_feed, latest_known) {
                        self.insert_from_feed(&podcast, episode_feed, latest_known)
                            .await?;
                    }
                }
            }
        }

        let feed_uuids: HashSet<&str> =
            feed.episodes.iter().map(|e| e.uuid.as_str()).collect();
        self.clean_up_absent(&local_episodes, &feed_uuids).await?;
        Ok(())
    }

    async fn insert_from_feed(
        &self,
        podcast: &Podcast,
        episode_feed: &EpisodeFeed,
        latest_known: Option<i64>,
    ) -> Result<()> {
        let mut episode =
            episode_from_feed(&podcast.uuid, episode_feed, self.clock.now_millis());
        if podcast.is_subscribed {
            if let Some(latest) = latest_known {
                if episode_feed.published_at <= latest - BACKDATE_ARCHIVE_THRESHOLD_MS {
                    episode.is_archived = true;
                }
            }
        }
        self.episodes.insert(&episode).await?;
        Ok(())
    }

    /// Delete old episodes the feed no longer lists. Downloads in flight,
    /// manual-playlist picks and the loaded episode are kept.
    async fn clean_up_absent(
        &self,
        local_episodes: &[Episode],
        feed_uuids: &HashSet<&str>,
    ) -> Result<()> {
        let cutoff = self.clock.now_millis() - ABSENT_EPISODE_RETENTION_MS;
        let pinned: HashSet<String> = self
            .filters
            .manually_added_episode_uuids()
            .await?
            .into_iter()
            .collect();

        for episode in local_episodes {
            if feed_uuids.contains(episode.uuid.as_str()) {
                continue;
            }
            if episode.published_at >= cutoff
                || !episode.eligible_for_cleanup()
                || pinned.contains(&episode.uuid)
                || self.player.is_loaded(&episode.uuid).await
            {
                continue;
            }
            debug!(episode = %episode.uuid, "removing episode dropped from the feed");
            self.episodes.delete(&episode.uuid).await?;
        }
        Ok(())
    }
}

/// Whether a feed episode unknown to the device should be inserted here.
/// For subscribed podcasts, genuinely new episodes arrive through the
/// notification pipeline instead; the refresher only backfills older ones.
fn should_insert(podcast: &Podcast, episode_feed: &EpisodeFeed, latest_known: Option<i64>) -> bool {
    if !podcast.is_subscribed {
        return true;
    }
    matches!(latest_known, Some(latest) if episode_feed.published_at < latest)
}

/// Copy feed-owned metadata onto a local episode, leaving user state alone.
/// A zero feed duration never clobbers a known one, and the reported file
/// size is frozen once the episode has been downloaded.
fn merge_feed_fields(episode: &mut Episode, feed: &EpisodeFeed) {
    episode.title = feed.title.clone();
    episode.url = feed.url.clone();
    episode.file_type = feed.file_type.clone();
    episode.published_at = feed.published_at;
    episode.season = feed.season;
    episode.number = feed.number;
    episode.episode_type = feed.episode_type.clone();
    if feed.duration_secs > 0.0 {
        episode.duration_secs = feed.duration_secs;
    }
    if !episode.is_downloaded() {
        episode.size_bytes = feed.size_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::feed::PodcastFeed;
    use bridge_traits::{FixedClock, IdlePlayer};
    use core_library::db::create_test_pool;
    use core_library::models::EpisodeStatus;
    use core_library::repositories::{
        SqliteEpisodeRepository, SqliteFilterRepository, SqlitePodcastRepository,
    };
    use mockall::mock;

    mock! {
        Feeds {}

        #[async_trait]
        impl FeedService for Feeds {
            async fn podcast_feed(&self, podcast_uuid: &str) -> BridgeResult<PodcastFeed>;
            async fn episode(
                &self,
                podcast_uuid: &str,
                episode_uuid: &str,
            ) -> BridgeResult<Option<EpisodeFeed>>;
        }
    }

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const NOW: i64 = 1_700_000_000_000;

    struct Harness {
        podcasts: Arc<SqlitePodcastRepository>,
        episodes: Arc<SqliteEpisodeRepository>,
        filters: Arc<SqliteFilterRepository>,
    }

    async fn harness() -> Harness {
        let pool = create_test_pool().await.unwrap();
        Harness {
            podcasts: Arc::new(SqlitePodcastRepository::new(pool.clone())),
            episodes: Arc::new(SqliteEpisodeRepository::new(pool.clone())),
            filters: Arc::new(SqliteFilterRepository::new(pool)),
        }
    }

    fn refresher(harness: &Harness, feeds: MockFeeds) -> PodcastRefresher {
        PodcastRefresher::new(
            Arc::new(feeds),
            harness.podcasts.clone(),
            harness.episodes.clone(),
            harness.filters.clone(),
            Arc::new(IdlePlayer),
            Arc::new(FixedClock::at_millis(NOW)),
        )
    }

    fn feed_episode(uuid: &str, published_at: i64) -> EpisodeFeed {
        EpisodeFeed {
            uuid: uuid.to_string(),
            title: format!("Episode {uuid}"),
            url: format!("https://cdn.example.com/{uuid}.mp3"),
            published_at,
            ..Default::default()
        }
    }

    async fn subscribed_podcast(harness: &Harness) -> Podcast {
        let mut podcast = Podcast::new("p1", "Test Show");
        podcast.is_subscribed = true;
        harness.podcasts.insert(&podcast).await.unwrap();
        podcast
    }

    #[tokio::test]
    async fn backdated_episodes_arrive_archived() {
        let harness = harness().await;
        subscribed_podcast(&harness).await;

        let newest = Episode {
            published_at: NOW,
            ..Episode::new("known", "p1", "Known")
        };
        harness.episodes.insert(&newest).await.unwrap();

        let mut feeds = MockFeeds::new();
        feeds.expect_podcast_feed().returning(move |_| {
            Ok(PodcastFeed {
                uuid: "p1".to_string(),
                title: "Test Show".to_string(),
                episodes: vec![
                    feed_episode("known", NOW),
                    feed_episode("recent", NOW - 2 * DAY_MS),
                    feed_episode("backdated", NOW - 10 * DAY_MS),
                ],
                ..Default::default()
            })
        });

        refresher(&harness, feeds).refresh_podcast("p1").await.unwrap();

        let recent = harness.episodes.find_by_uuid("recent").await.unwrap().unwrap();
        assert!(!recent.is_archived);
        let backdated = harness
            .episodes
            .find_by_uuid("backdated")
            .await
            .unwrap()
            .unwrap();
        assert!(backdated.is_archived);
    }

    #[tokio::test]
    async fn downloaded_size_survives_feed_changes() {
        let harness = harness().await;
        subscribed_podcast(&harness).await;

        let downloaded = Episode {
            size_bytes: 5_000_000,
            episode_status: EpisodeStatus::Downloaded,
            duration_secs: 1200.0,
            published_at: NOW,
            ..Episode::new("e1", "p1", "Old Title")
        };
        harness.episodes.insert(&downloaded).await.unwrap();

        let mut feeds = MockFeeds::new();
        feeds.expect_podcast_feed().returning(move |_| {
            let mut ep = feed_episode("e1", NOW);
            ep.size_bytes = 9_999_999;
            ep.duration_secs = 0.0;
            Ok(PodcastFeed {
                uuid: "p1".to_string(),
                title: "Test Show".to_string(),
                episodes: vec![ep],
                ..Default::default()
            })
        });

        refresher(&harness, feeds).refresh_podcast("p1").await.unwrap();

        let merged = harness.episodes.find_by_uuid("e1").await.unwrap().unwrap();
        assert_eq!(merged.size_bytes, 5_000_000);
        assert_eq!(merged.duration_secs, 1200.0);
        assert_eq!(merged.title, "Episode e1");
    }

    #[tokio::test]
    async fn absent_episodes_cleaned_up_after_retention() {
        let harness = harness().await;
        subscribed_podcast(&harness).await;

        let old_absent = Episode {
            published_at: NOW - 30 * DAY_MS,
            ..Episode::new("old", "p1", "Old")
        };
        let fresh_absent = Episode {
            published_at: NOW - 3 * DAY_MS,
            ..Episode::new("fresh", "p1", "Fresh")
        };
        let pinned_absent = Episode {
            published_at: NOW - 30 * DAY_MS,
            ..Episode::new("pinned", "p1", "Pinned")
        };
        let downloading_absent = Episode {
            published_at: NOW - 30 * DAY_MS,
            episode_status: EpisodeStatus::Downloading,
            ..Episode::new("downloading", "p1", "Downloading")
        };
        for episode in [&old_absent, &fresh_absent, &pinned_absent, &downloading_absent] {
            harness.episodes.insert(episode).await.unwrap();
        }
        harness
            .filters
            .add_manual_episode("road-trip", "pinned")
            .await
            .unwrap();

        let mut feeds = MockFeeds::new();
        feeds.expect_podcast_feed().returning(move |_| {
            Ok(PodcastFeed {
                uuid: "p1".to_string(),
                title: "Test Show".to_string(),
                episodes: vec![],
                ..Default::default()
            })
        });

        refresher(&harness, feeds).refresh_podcast("p1").await.unwrap();

        assert!(harness.episodes.find_by_uuid("old").await.unwrap().is_none());
        assert!(harness.episodes.find_by_uuid("fresh").await.unwrap().is_some());
        assert!(harness.episodes.find_by_uuid("pinned").await.unwrap().is_some());
        assert!(harness
            .episodes
            .find_by_uuid("downloading")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn new_episodes_of_subscribed_podcasts_are_left_to_notifications() {
        let harness = harness().await;
        subscribed_podcast(&harness).await;

        let newest = Episode {
            published_at: NOW - DAY_MS,
            ..Episode::new("known", "p1", "Known")
        };
        harness.episodes.insert(&newest).await.unwrap();

        let mut feeds = MockFeeds::new();
        feeds.expect_podcast_feed().returning(move |_| {
            Ok(PodcastFeed {
                uuid: "p1".to_string(),
                title: "Test Show".to_string(),
                episodes: vec![feed_episode("known", NOW - DAY_MS), feed_episode("brand-new", NOW)],
                ..Default::default()
            })
        });

        refresher(&harness, feeds).refresh_podcast("p1").await.unwrap();

        assert!(harness
            .episodes
            .find_by_uuid("brand-new")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn broken_feed_does_not_stall_refresh_all() {
        let harness = harness().await;
        subscribed_podcast(&harness).await;

        let mut feeds = MockFeeds::new();
        feeds.expect_podcast_feed().returning(|_| {
            Err(bridge_traits::BridgeError::OperationFailed(
                "feed outage".to_string(),
            ))
        });

        refresher(&harness, feeds).refresh_all().await.unwrap();
    }
}

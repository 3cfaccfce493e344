//! Podcast feed snapshots.
//!
//! The refresh/import side of the engine reads podcast data from the host's
//! feed/cache service rather than parsing RSS itself. A snapshot carries the
//! feed-owned podcast fields plus the full episode list as the feed currently
//! publishes it.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A podcast as the feed currently describes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastFeed {
    pub uuid: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Predicted publish time of the next episode, milliseconds.
    #[serde(default)]
    pub estimated_next_episode_at: Option<i64>,
    #[serde(default)]
    pub funding_url: Option<String>,
    #[serde(default)]
    pub episodes: Vec<EpisodeFeed>,
}

/// An episode as the feed currently describes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeFeed {
    pub uuid: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub file_type: String,
    /// Duration in seconds; 0 when the feed does not report one.
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub size_bytes: i64,
    /// Publish time, milliseconds.
    pub published_at: i64,
    #[serde(default)]
    pub season: Option<i64>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub episode_type: Option<String>,
}

/// Feed/cache lookup service provided by the host.
#[async_trait]
pub trait FeedService: Send + Sync {
    /// Fetch the latest snapshot of one podcast's feed.
    async fn podcast_feed(&self, podcast_uuid: &str) -> Result<PodcastFeed>;

    /// Fetch metadata for a single episode, `None` if the service has no
    /// record of it.
    async fn episode(&self, podcast_uuid: &str, episode_uuid: &str)
        -> Result<Option<EpisodeFeed>>;
}

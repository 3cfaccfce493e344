//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host
//! application embedding the podcast sync engine.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and its
//! platform-specific collaborators. Each trait represents a capability the
//! engine requires but that is implemented differently per host (desktop,
//! mobile, headless test harness).
//!
//! ## Traits
//!
//! - [`SyncClient`](sync::SyncClient) - Authenticated sync service transport
//! - [`FeedService`](feed::FeedService) - Podcast feed snapshots and episode lookup
//! - [`PlayerBridge`](player::PlayerBridge) - Active-player guard and seek
//! - [`UserEpisodeBridge`](user_episodes::UserEpisodeBridge) - Cloud-file episodes
//! - [`SettingsStore`](settings::SettingsStore) - Cursor/watermark persistence
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations should convert transport-specific failures into it and
//! keep HTTP statuses visible: the engine treats `304 Not Modified` on the
//! up-next endpoint as success-with-no-changes.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so the engine can run them from
//! background tasks.

pub mod error;
pub mod feed;
pub mod player;
pub mod settings;
pub mod sync;
pub mod time;
pub mod user_episodes;

pub use error::{BridgeError, Result};
pub use feed::{EpisodeFeed, FeedService, PodcastFeed};
pub use player::{IdlePlayer, PlayerBridge};
pub use settings::{MemorySettingsStore, SettingsStore};
pub use sync::SyncClient;
pub use time::{Clock, FixedClock, SystemClock};
pub use user_episodes::{UserEpisodeBridge, USER_EPISODE_PODCAST_UUID};

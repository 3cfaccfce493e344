//! User-uploaded episode ("cloud file") collaborator.
//!
//! User files live outside the podcast catalogue: they belong to a synthetic
//! podcast and are stored, uploaded and synced by their own manager on the
//! host side. The engine only needs two entry points: resolve a missing user
//! episode that appeared in the up-next queue, and run the cloud-file sync
//! stage.

use crate::error::Result;
use async_trait::async_trait;

/// Uuid of the synthetic podcast that owns all user-uploaded episodes. Never
/// imported as a real podcast.
pub const USER_EPISODE_PODCAST_UUID: &str = "da7aba5e-f11e-f11e-f11e-da7aba5ef11e";

/// Host-side manager for user-uploaded episodes.
#[async_trait]
pub trait UserEpisodeBridge: Send + Sync {
    /// Fetch and store a user episode that the server references but the
    /// device does not have.
    async fn download_missing(&self, episode_uuid: &str) -> Result<()>;

    /// Run the cloud-file sync stage (uploads, deletions, metadata).
    async fn sync_all(&self) -> Result<()>;
}

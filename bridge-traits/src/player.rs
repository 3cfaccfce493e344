//! Active-player guard bridge.
//!
//! The merge rules need to know whether an episode is the one loaded in the
//! player right now: server-side status changes for that episode must never be
//! applied silently. This trait is the only coupling between the sync engine
//! and playback.

use async_trait::async_trait;

/// View of the active player the sync engine is allowed to see.
#[async_trait]
pub trait PlayerBridge: Send + Sync {
    /// Uuid of the episode currently loaded in the player, if any.
    async fn current_episode_uuid(&self) -> Option<String>;

    /// Whether the given episode is loaded *and* actively playing.
    async fn is_playing(&self, episode_uuid: &str) -> bool;

    /// Whether the given episode is loaded in the player (playing or paused).
    async fn is_loaded(&self, episode_uuid: &str) -> bool {
        self.current_episode_uuid().await.as_deref() == Some(episode_uuid)
    }

    /// Move the player position for a loaded episode to match a server-applied
    /// played-up-to value.
    async fn seek_to(&self, episode_uuid: &str, position_secs: f64);

    /// Called after the queue has been replaced by a sync import so the player
    /// can reload it from storage and re-validate the current pointer.
    async fn on_queue_imported(&self);
}

/// Player bridge for hosts without an active player (tests, background-only
/// processes). Nothing is ever loaded.
#[derive(Debug, Clone, Default)]
pub struct IdlePlayer;

#[async_trait]
impl PlayerBridge for IdlePlayer {
    async fn current_episode_uuid(&self) -> Option<String> {
        None
    }

    async fn is_playing(&self, _episode_uuid: &str) -> bool {
        false
    }

    async fn seek_to(&self, _episode_uuid: &str, _position_secs: f64) {}

    async fn on_queue_imported(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_player_has_nothing_loaded() {
        let player = IdlePlayer;
        assert_eq!(player.current_episode_uuid().await, None);
        assert!(!player.is_loaded("e1").await);
        assert!(!player.is_playing("e1").await);
    }
}

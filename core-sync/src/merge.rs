//! Field-level merge rules for server state.
//!
//! The server delta carries last-writer-wins values; locally we only trust
//! them when they do not fight the active player. Merging mutates the local
//! row in place and reports whether a write is needed, so callers decide when
//! to hit the database.

use bridge_traits::sync::{EpisodeDelta, PodcastDelta};
use bridge_traits::{Clock, PlayerBridge};
use core_library::models::PlayingStatus;
use core_library::{Episode, Podcast};
use tracing::warn;

/// Server positions closer than this to the local value are treated as equal,
/// so two devices paused at almost the same spot do not ping-pong seeks.
pub const PLAYED_UP_TO_TOLERANCE_SECS: f64 = 2.0;

/// What applying a server delta to one episode produced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeMergeOutcome {
    /// The row was mutated and needs a write.
    pub changed: bool,
    /// The loaded episode's player position should move here, seconds.
    pub seek_to: Option<f64>,
}

/// Merge server-side episode state into the local row.
///
/// Status and archive flags of the episode loaded in the player are never
/// overwritten; instead the local value is re-stamped dirty so it wins the
/// next upload. Played-up-to is skipped entirely while the episode is actively
/// playing.
pub async fn apply_episode_delta(
    episode: &mut Episode,
    delta: &EpisodeDelta,
    player: &dyn PlayerBridge,
    clock: &dyn Clock,
) -> EpisodeMergeOutcome {
    let mut outcome = EpisodeMergeOutcome::default();
    let loaded = player.is_loaded(&episode.uuid).await;

    if let Some(starred) = delta.starred {
        if episode.starred != starred || episode.starred_modified.is_some() {
            episode.starred = starred;
            episode.starred_modified = None;
            outcome.changed = true;
        }
    }

    if let Some(duration) = delta.duration {
        if duration > 0.0
            && (episode.duration_secs != duration || episode.duration_modified.is_some())
        {
            episode.duration_secs = duration;
            episode.duration_modified = None;
            outcome.changed = true;
        }
    }

    if let Some(archived) = delta.is_archived {
        if archived == episode.is_archived {
            if episode.archived_modified.is_some() {
                episode.archived_modified = None;
                outcome.changed = true;
            }
        } else if loaded {
            // The loaded episode must not vanish from under the player. Keep
            // the local value and push it back on the next cycle.
            episode.archived_modified = Some(clock.now_millis());
            outcome.changed = true;
        } else {
            episode.is_archived = archived;
            episode.archived_modified = None;
            outcome.changed = true;
        }
    }

    if let Some(raw_status) = delta.playing_status {
        match PlayingStatus::from_i32(raw_status) {
            None => {
                warn!(episode = %episode.uuid, raw_status, "ignoring unknown playing status");
            }
            Some(status) => {
                if status == episode.playing_status {
                    if episode.playing_status_modified.is_some() {
                        episode.playing_status_modified = None;
                        outcome.changed = true;
                    }
                } else if loaded {
                    episode.playing_status_modified = Some(clock.now_millis());
                    outcome.changed = true;
                } else {
                    episode.playing_status = status;
                    episode.playing_status_modified = None;
                    outcome.changed = true;
                }
            }
        }
    }

    if let Some(position) = delta.played_up_to {
        if position >= 0.0
            && !player.is_playing(&episode.uuid).await
            && (position - episode.played_up_to).abs() > PLAYED_UP_TO_TOLERANCE_SECS
        {
            episode.played_up_to = position;
            episode.played_up_to_modified = None;
            outcome.changed = true;
            if loaded {
                outcome.seek_to = Some(position);
            }
        }
    }

    outcome
}

/// Merge server podcast settings into the local row. Returns whether the row
/// changed. When both sides know a subscription date the older one wins, so a
/// reinstall does not move podcasts to the top of "recently added".
pub fn reconcile_podcast(local: &mut Podcast, remote: &PodcastDelta) -> bool {
    let before = local.clone();

    if let Some(value) = remote.start_from_secs {
        local.start_from_secs = value;
    }
    if let Some(value) = remote.skip_last_secs {
        local.skip_last_secs = value;
    }
    if remote.folder_uuid.is_some() {
        local.folder_uuid = remote.folder_uuid.clone();
    }
    if let Some(value) = remote.sort_position {
        local.sort_position = value;
    }
    if let Some(remote_added) = remote.date_added {
        local.date_added = Some(match local.date_added {
            Some(local_added) => local_added.min(remote_added),
            None => remote_added,
        });
    }

    *local != before
}

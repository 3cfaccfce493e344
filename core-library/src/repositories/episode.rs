//! Episode repository trait and SQLite implementation.
//!
//! The dirty-timestamp bookkeeping lives here: `find_to_sync` selects rows
//! with any non-null `*_modified` column, and `clear_dirty_up_to` nulls only
//! the timestamps that were actually covered by an upload, so edits made
//! while a sync round-trip is in flight survive to the next cycle.

use crate::error::Result;
use crate::models::{Episode, SyncStatus};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Episode>>;

    async fn insert(&self, episode: &Episode) -> Result<()>;

    async fn update(&self, episode: &Episode) -> Result<()>;

    /// Delete a row outright. Returns whether a row existed. Local-only
    /// cleanup; never produces an upload.
    async fn delete(&self, uuid: &str) -> Result<bool>;

    /// Episodes with at least one field pending upload.
    async fn find_to_sync(&self) -> Result<Vec<Episode>>;

    /// Null out dirty timestamps that are `<= cutoff` for the given episode.
    /// Timestamps newer than the cutoff were stamped after the upload payload
    /// was built and stay dirty.
    async fn clear_dirty_up_to(&self, uuid: &str, cutoff: i64) -> Result<()>;

    async fn episodes_for_podcast(&self, podcast_uuid: &str) -> Result<Vec<Episode>>;

    /// Publish time of the newest known episode of a podcast, milliseconds.
    async fn latest_published_at(&self, podcast_uuid: &str) -> Result<Option<i64>>;

    /// Episodes whose playback interaction is pending history upload.
    async fn find_interactions_to_sync(&self) -> Result<Vec<Episode>>;

    /// Acknowledge uploaded history records for the given episodes.
    async fn mark_interactions_synced(&self, uuids: &[String]) -> Result<()>;

    /// Drop interaction times older than the given server clear timestamp.
    async fn delete_interactions_before(&self, cutoff: i64) -> Result<()>;
}

pub struct SqliteEpisodeRepository {
    pool: SqlitePool,
}

impl SqliteEpisodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpisodeRepository for SqliteEpisodeRepository {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Episode>> {
        let episode = query_as::<_, Episode>("SELECT * FROM episodes WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(episode)
    }

    async fn insert(&self, episode: &Episode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO episodes (
                uuid, podcast_uuid, title, url, file_type, duration_secs,
                size_bytes, published_at, season, number, episode_type,
                playing_status, playing_status_modified, played_up_to,
                played_up_to_modified, starred, starred_modified, is_archived,
                archived_modified, duration_modified, episode_status,
                last_playback_interaction, interaction_sync_status,
                interaction_removed, date_added
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?
            )
            "#,
        )
        .bind(&episode.uuid)
        .bind(&episode.podcast_uuid)
        .bind(&episode.title)
        .bind(&episode.url)
        .bind(&episode.file_type)
        .bind(episode.duration_secs)
        .bind(episode.size_bytes)
        .bind(episode.published_at)
        .bind(episode.season)
        .bind(episode.number)
        .bind(&episode.episode_type)
        .bind(episode.playing_status)
        .bind(episode.playing_status_modified)
        .bind(episode.played_up_to)
        .bind(episode.played_up_to_modified)
        .bind(episode.starred)
        .bind(episode.starred_modified)
        .bind(episode.is_archived)
        .bind(episode.archived_modified)
        .bind(episode.duration_modified)
        .bind(episode.episode_status)
        .bind(episode.last_playback_interaction)
        .bind(episode.interaction_sync_status)
        .bind(episode.interaction_removed)
        .bind(episode.date_added)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, episode: &Episode) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE episodes SET
                podcast_uuid = ?, title = ?, url = ?, file_type = ?,
                duration_secs = ?, size_bytes = ?, published_at = ?,
                season = ?, number = ?, episode_type = ?, playing_status = ?,
                playing_status_modified = ?, played_up_to = ?,
                played_up_to_modified = ?, starred = ?, starred_modified = ?,
                is_archived = ?, archived_modified = ?, duration_modified = ?,
                episode_status = ?, last_playback_interaction = ?,
                interaction_sync_status = ?, interaction_removed = ?,
                date_added = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&episode.podcast_uuid)
        .bind(&episode.title)
        .bind(&episode.url)
        .bind(&episode.file_type)
        .bind(episode.duration_secs)
        .bind(episode.size_bytes)
        .bind(episode.published_at)
        .bind(episode.season)
        .bind(episode.number)
        .bind(&episode.episode_type)
        .bind(episode.playing_status)
        .bind(episode.playing_status_modified)
        .bind(episode.played_up_to)
        .bind(episode.played_up_to_modified)
        .bind(episode.starred)
        .bind(episode.starred_modified)
        .bind(episode.is_archived)
        .bind(episode.archived_modified)
        .bind(episode.duration_modified)
        .bind(episode.episode_status)
        .bind(episode.last_playback_interaction)
        .bind(episode.interaction_sync_status)
        .bind(episode.interaction_removed)
        .bind(episode.date_added)
        .bind(&episode.uuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM episodes WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_to_sync(&self) -> Result<Vec<Episode>> {
        let episodes = query_as::<_, Episode>(
            r#"
            SELECT * FROM episodes
            WHERE playing_status_modified IS NOT NULL
               OR played_up_to_modified IS NOT NULL
               OR starred_modified IS NOT NULL
               OR archived_modified IS NOT NULL
               OR duration_modified IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(episodes)
    }

    async fn clear_dirty_up_to(&self, uuid: &str, cutoff: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE episodes SET
                playing_status_modified = CASE
                    WHEN playing_status_modified <= ? THEN NULL
                    ELSE playing_status_modified END,
                played_up_to_modified = CASE
                    WHEN played_up_to_modified <= ? THEN NULL
                    ELSE played_up_to_modified END,
                starred_modified = CASE
                    WHEN starred_modified <= ? THEN NULL
                    ELSE starred_modified END,
                archived_modified = CASE
                    WHEN archived_modified <= ? THEN NULL
                    ELSE archived_modified END,
                duration_modified = CASE
                    WHEN duration_modified <= ? THEN NULL
                    ELSE duration_modified END
            WHERE uuid = ?
            "#,
        )
        .bind(cutoff)
        .bind(cutoff)
        .bind(cutoff)
        .bind(cutoff)
        .bind(cutoff)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn episodes_for_podcast(&self, podcast_uuid: &str) -> Result<Vec<Episode>> {
        let episodes = query_as::<_, Episode>(
            "SELECT * FROM episodes WHERE podcast_uuid = ? ORDER BY published_at DESC",
        )
        .bind(podcast_uuid)
        .fetch_all(&self.pool)
        .await?;
        Ok(episodes)
    }

    async fn latest_published_at(&self, podcast_uuid: &str) -> Result<Option<i64>> {
        let row: (Option<i64>,) =
            query_as("SELECT MAX(published_at) FROM episodes WHERE podcast_uuid = ?")
                .bind(podcast_uuid)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn find_interactions_to_sync(&self) -> Result<Vec<Episode>> {
        let episodes = query_as::<_, Episode>(
            r#"
            SELECT * FROM episodes
            WHERE last_playback_interaction IS NOT NULL
              AND last_playback_interaction > 0
              AND (interaction_sync_status = ? OR interaction_removed = 1)
            "#,
        )
        .bind(SyncStatus::NotSynced)
        .fetch_all(&self.pool)
        .await?;
        Ok(episodes)
    }

    async fn mark_interactions_synced(&self, uuids: &[String]) -> Result<()> {
        for uuid in uuids {
            sqlx::query(
                r#"
                UPDATE episodes SET
                    interaction_sync_status = ?,
                    interaction_removed = 0,
                    last_playback_interaction = CASE
                        WHEN interaction_removed = 1 THEN NULL
                        ELSE last_playback_interaction END
                WHERE uuid = ?
                "#,
            )
            .bind(SyncStatus::Synced)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn delete_interactions_before(&self, cutoff: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE episodes SET last_playback_interaction = NULL
            WHERE last_playback_interaction IS NOT NULL
              AND last_playback_interaction < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::PlayingStatus;

    fn episode(uuid: &str, published_at: i64) -> Episode {
        let mut e = Episode::new(uuid, "p1", format!("Episode {uuid}"));
        e.published_at = published_at;
        e
    }

    #[tokio::test]
    async fn insert_update_round_trip() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        let mut e = episode("e1", 1000);
        repo.insert(&e).await.unwrap();

        e.playing_status = PlayingStatus::InProgress;
        e.played_up_to = 120.5;
        e.played_up_to_modified = Some(5000);
        repo.update(&e).await.unwrap();

        let found = repo.find_by_uuid("e1").await.unwrap().unwrap();
        assert_eq!(found, e);
    }

    #[tokio::test]
    async fn find_to_sync_selects_any_dirty_field() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        let clean = episode("clean", 1);
        let mut starred = episode("starred", 2);
        starred.starred_modified = Some(10);
        let mut archived = episode("archived", 3);
        archived.archived_modified = Some(20);

        repo.insert(&clean).await.unwrap();
        repo.insert(&starred).await.unwrap();
        repo.insert(&archived).await.unwrap();

        let mut dirty: Vec<String> = repo
            .find_to_sync()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.uuid)
            .collect();
        dirty.sort();
        assert_eq!(dirty, vec!["archived".to_string(), "starred".to_string()]);
    }

    #[tokio::test]
    async fn clear_dirty_preserves_newer_timestamps() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        let mut e = episode("e1", 1);
        e.starred_modified = Some(100);
        e.played_up_to_modified = Some(900);
        repo.insert(&e).await.unwrap();

        // A concurrent edit at t=900 happened after the upload built at t=500.
        repo.clear_dirty_up_to("e1", 500).await.unwrap();

        let found = repo.find_by_uuid("e1").await.unwrap().unwrap();
        assert_eq!(found.starred_modified, None);
        assert_eq!(found.played_up_to_modified, Some(900));
    }

    #[tokio::test]
    async fn latest_published_at_tracks_newest_episode() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        assert_eq!(repo.latest_published_at("p1").await.unwrap(), None);

        repo.insert(&episode("old", 1_000)).await.unwrap();
        repo.insert(&episode("new", 9_000)).await.unwrap();

        assert_eq!(repo.latest_published_at("p1").await.unwrap(), Some(9_000));
    }

    #[tokio::test]
    async fn interaction_sync_lifecycle() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        let mut watched = episode("w1", 1);
        watched.last_playback_interaction = Some(10_000);
        watched.interaction_sync_status = SyncStatus::NotSynced;
        repo.insert(&watched).await.unwrap();

        let mut removed = episode("r1", 2);
        removed.last_playback_interaction = Some(11_000);
        removed.interaction_sync_status = SyncStatus::Synced;
        removed.interaction_removed = true;
        repo.insert(&removed).await.unwrap();

        let pending = repo.find_interactions_to_sync().await.unwrap();
        assert_eq!(pending.len(), 2);

        repo.mark_interactions_synced(&["w1".to_string(), "r1".to_string()])
            .await
            .unwrap();
        assert!(repo.find_interactions_to_sync().await.unwrap().is_empty());

        // The removed interaction is gone, the watched one survives.
        let r1 = repo.find_by_uuid("r1").await.unwrap().unwrap();
        assert_eq!(r1.last_playback_interaction, None);
        let w1 = repo.find_by_uuid("w1").await.unwrap().unwrap();
        assert_eq!(w1.last_playback_interaction, Some(10_000));
    }

    #[tokio::test]
    async fn delete_interactions_before_cutoff() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEpisodeRepository::new(pool);

        let mut old = episode("old", 1);
        old.last_playback_interaction = Some(1_000);
        let mut recent = episode("recent", 2);
        recent.last_playback_interaction = Some(9_000);
        repo.insert(&old).await.unwrap();
        repo.insert(&recent).await.unwrap();

        repo.delete_interactions_before(5_000).await.unwrap();

        assert_eq!(
            repo.find_by_uuid("old")
                .await
                .unwrap()
                .unwrap()
                .last_playback_interaction,
            None
        );
        assert_eq!(
            repo.find_by_uuid("recent")
                .await
                .unwrap()
                .unwrap()
                .last_playback_interaction,
            Some(9_000)
        );
    }
}

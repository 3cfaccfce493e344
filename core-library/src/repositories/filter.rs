//! Episode filter (smart playlist) repository.

use crate::error::Result;
use crate::models::{EpisodeFilter, SyncStatus};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait FilterRepository: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<EpisodeFilter>>;

    async fn insert(&self, filter: &EpisodeFilter) -> Result<()>;

    async fn update(&self, filter: &EpisodeFilter) -> Result<()>;

    /// Physically remove a filter row (used once a deletion tombstone has been
    /// acknowledged, or when the server reports a filter deleted).
    async fn delete(&self, uuid: &str) -> Result<bool>;

    /// Filters pending upload. Manual playlists never sync.
    async fn find_to_sync(&self) -> Result<Vec<EpisodeFilter>>;

    /// Acknowledge uploads: mark rows synced and drop acknowledged tombstones.
    async fn mark_all_synced(&self) -> Result<()>;

    /// Pin an episode to a manual playlist.
    async fn add_manual_episode(&self, filter_uuid: &str, episode_uuid: &str) -> Result<()>;

    /// Uuids of every episode hand-picked into a manual playlist. Feed cleanup
    /// must not delete these.
    async fn manually_added_episode_uuids(&self) -> Result<Vec<String>>;
}

pub struct SqliteFilterRepository {
    pool: SqlitePool,
}

impl SqliteFilterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilterRepository for SqliteFilterRepository {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<EpisodeFilter>> {
        let filter = query_as::<_, EpisodeFilter>("SELECT * FROM filters WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(filter)
    }

    async fn insert(&self, filter: &EpisodeFilter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO filters (
                uuid, title, sort_position, manual, deleted, sync_status,
                unplayed, partially_played, finished, audio_video, filter_hours
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&filter.uuid)
        .bind(&filter.title)
        .bind(filter.sort_position)
        .bind(filter.manual)
        .bind(filter.deleted)
        .bind(filter.sync_status)
        .bind(filter.unplayed)
        .bind(filter.partially_played)
        .bind(filter.finished)
        .bind(filter.audio_video)
        .bind(filter.filter_hours)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, filter: &EpisodeFilter) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE filters SET
                title = ?, sort_position = ?, manual = ?, deleted = ?,
                sync_status = ?, unplayed = ?, partially_played = ?,
                finished = ?, audio_video = ?, filter_hours = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&filter.title)
        .bind(filter.sort_position)
        .bind(filter.manual)
        .bind(filter.deleted)
        .bind(filter.sync_status)
        .bind(filter.unplayed)
        .bind(filter.partially_played)
        .bind(filter.finished)
        .bind(filter.audio_video)
        .bind(filter.filter_hours)
        .bind(&filter.uuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM filters WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_to_sync(&self) -> Result<Vec<EpisodeFilter>> {
        let filters = query_as::<_, EpisodeFilter>(
            "SELECT * FROM filters WHERE sync_status = ? AND manual = 0",
        )
        .bind(SyncStatus::NotSynced)
        .fetch_all(&self.pool)
        .await?;
        Ok(filters)
    }

    async fn mark_all_synced(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM filters WHERE deleted = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE filters SET sync_status = ?")
            .bind(SyncStatus::Synced)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_manual_episode(&self, filter_uuid: &str, episode_uuid: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO filter_episodes (filter_uuid, episode_uuid, position)
            VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM filter_episodes
                 WHERE filter_uuid = ?)
            )
            ON CONFLICT (filter_uuid, episode_uuid) DO NOTHING
            "#,
        )
        .bind(filter_uuid)
        .bind(episode_uuid)
        .bind(filter_uuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn manually_added_episode_uuids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = query_as("SELECT DISTINCT episode_uuid FROM filter_episodes")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(uuid,)| uuid).collect())
    }
}

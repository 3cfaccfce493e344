//! Podcast repository trait and SQLite implementation.

use crate::error::Result;
use crate::models::{Podcast, SyncStatus};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Data access surface the sync engine needs for podcasts.
#[async_trait]
pub trait PodcastRepository: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Podcast>>;

    async fn insert(&self, podcast: &Podcast) -> Result<()>;

    /// Update an existing podcast. Silently no-ops for unknown uuids; callers
    /// that need existence guarantees look the row up first.
    async fn update(&self, podcast: &Podcast) -> Result<()>;

    /// Uuids of all subscribed podcasts.
    async fn subscribed_uuids(&self) -> Result<Vec<String>>;

    /// Podcasts with local changes pending upload.
    async fn find_to_sync(&self) -> Result<Vec<Podcast>>;

    /// Mark every podcast as acknowledged by the server.
    async fn mark_all_synced(&self) -> Result<()>;

    /// Force every podcast back into the upload set. Used after a home-grid
    /// re-import so the next incremental pass reconciles fully.
    async fn mark_all_unsynced(&self) -> Result<()>;
}

pub struct SqlitePodcastRepository {
    pool: SqlitePool,
}

impl SqlitePodcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PodcastRepository for SqlitePodcastRepository {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Podcast>> {
        let podcast = query_as::<_, Podcast>("SELECT * FROM podcasts WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(podcast)
    }

    async fn insert(&self, podcast: &Podcast) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO podcasts (
                uuid, title, author, category, description,
                estimated_next_episode_at, funding_url, is_subscribed,
                start_from_secs, skip_last_secs, folder_uuid, sort_position,
                date_added, sync_status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&podcast.uuid)
        .bind(&podcast.title)
        .bind(&podcast.author)
        .bind(&podcast.category)
        .bind(&podcast.description)
        .bind(podcast.estimated_next_episode_at)
        .bind(&podcast.funding_url)
        .bind(podcast.is_subscribed)
        .bind(podcast.start_from_secs)
        .bind(podcast.skip_last_secs)
        .bind(&podcast.folder_uuid)
        .bind(podcast.sort_position)
        .bind(podcast.date_added)
        .bind(podcast.sync_status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, podcast: &Podcast) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE podcasts SET
                title = ?, author = ?, category = ?, description = ?,
                estimated_next_episode_at = ?, funding_url = ?, is_subscribed = ?,
                start_from_secs = ?, skip_last_secs = ?, folder_uuid = ?,
                sort_position = ?, date_added = ?, sync_status = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&podcast.title)
        .bind(&podcast.author)
        .bind(&podcast.category)
        .bind(&podcast.description)
        .bind(podcast.estimated_next_episode_at)
        .bind(&podcast.funding_url)
        .bind(podcast.is_subscribed)
        .bind(podcast.start_from_secs)
        .bind(podcast.skip_last_secs)
        .bind(&podcast.folder_uuid)
        .bind(podcast.sort_position)
        .bind(podcast.date_added)
        .bind(podcast.sync_status)
        .bind(&podcast.uuid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn subscribed_uuids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            query_as("SELECT uuid FROM podcasts WHERE is_subscribed = 1 ORDER BY sort_position")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(uuid,)| uuid).collect())
    }

    async fn find_to_sync(&self) -> Result<Vec<Podcast>> {
        let podcasts = query_as::<_, Podcast>("SELECT * FROM podcasts WHERE sync_status = ?")
            .bind(SyncStatus::NotSynced)
            .fetch_all(&self.pool)
            .await?;
        Ok(podcasts)
    }

    async fn mark_all_synced(&self) -> Result<()> {
        sqlx::query("UPDATE podcasts SET sync_status = ?")
            .bind(SyncStatus::Synced)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_unsynced(&self) -> Result<()> {
        sqlx::query("UPDATE podcasts SET sync_status = ?")
            .bind(SyncStatus::NotSynced)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn subscribed(uuid: &str) -> Podcast {
        let mut podcast = Podcast::new(uuid, format!("Podcast {uuid}"));
        podcast.is_subscribed = true;
        podcast
    }

    #[tokio::test]
    async fn insert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        let mut podcast = subscribed("p1");
        podcast.folder_uuid = Some("f1".to_string());
        podcast.date_added = Some(1_700_000_000_000);
        repo.insert(&podcast).await.unwrap();

        let found = repo.find_by_uuid("p1").await.unwrap().unwrap();
        assert_eq!(found, podcast);
        assert!(repo.find_by_uuid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_status_transitions() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        repo.insert(&subscribed("p1")).await.unwrap();
        repo.insert(&subscribed("p2")).await.unwrap();

        assert_eq!(repo.find_to_sync().await.unwrap().len(), 2);

        repo.mark_all_synced().await.unwrap();
        assert!(repo.find_to_sync().await.unwrap().is_empty());

        repo.mark_all_unsynced().await.unwrap();
        assert_eq!(repo.find_to_sync().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn subscribed_uuids_ordered_by_position() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        let mut first = subscribed("p-a");
        first.sort_position = 2;
        let mut second = subscribed("p-b");
        second.sort_position = 1;
        let mut unsubscribed = Podcast::new("p-c", "Gone");
        unsubscribed.is_subscribed = false;

        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();
        repo.insert(&unsubscribed).await.unwrap();

        assert_eq!(
            repo.subscribed_uuids().await.unwrap(),
            vec!["p-b".to_string(), "p-a".to_string()]
        );
    }
}

//! Home-grid folder repository.

use crate::error::Result;
use crate::models::Folder;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait FolderRepository: Send + Sync {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Folder>>;

    async fn all_uuids(&self) -> Result<Vec<String>>;

    /// Insert or fully overwrite a folder (server imports are upserts).
    async fn upsert(&self, folder: &Folder) -> Result<()>;

    async fn delete(&self, uuid: &str) -> Result<bool>;

    /// Folders with local changes pending upload.
    async fn find_to_sync(&self) -> Result<Vec<Folder>>;

    /// Acknowledge uploads: clear dirty timestamps and drop acknowledged
    /// tombstones.
    async fn mark_all_synced(&self) -> Result<()>;
}

pub struct SqliteFolderRepository {
    pool: SqlitePool,
}

impl SqliteFolderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderRepository for SqliteFolderRepository {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Folder>> {
        let folder = query_as::<_, Folder>("SELECT * FROM folders WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(folder)
    }

    async fn all_uuids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = query_as("SELECT uuid FROM folders WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(uuid,)| uuid).collect())
    }

    async fn upsert(&self, folder: &Folder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO folders (
                uuid, name, color, sort_position, podcasts_sort_type,
                date_added, deleted, sync_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (uuid) DO UPDATE SET
                name = excluded.name,
                color = excluded.color,
                sort_position = excluded.sort_position,
                podcasts_sort_type = excluded.podcasts_sort_type,
                date_added = excluded.date_added,
                deleted = excluded.deleted,
                sync_modified = excluded.sync_modified
            "#,
        )
        .bind(&folder.uuid)
        .bind(&folder.name)
        .bind(folder.color)
        .bind(folder.sort_position)
        .bind(folder.podcasts_sort_type)
        .bind(folder.date_added)
        .bind(folder.deleted)
        .bind(folder.sync_modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_to_sync(&self) -> Result<Vec<Folder>> {
        let folders = query_as::<_, Folder>("SELECT * FROM folders WHERE sync_modified IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        Ok(folders)
    }

    async fn mark_all_synced(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM folders WHERE deleted = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE folders SET sync_modified = NULL")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn upsert_inserts_then_overwrites() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteFolderRepository::new(pool);

        let mut folder = Folder::new("News", 1_000);
        repo.upsert(&folder).await.unwrap();

        folder.name = "World News".to_string();
        folder.color = 3;
        repo.upsert(&folder).await.unwrap();

        let found = repo.find_by_uuid(&folder.uuid).await.unwrap().unwrap();
        assert_eq!(found.name, "World News");
        assert_eq!(found.color, 3);
    }

    #[tokio::test]
    async fn dirty_folders_sync_then_clear() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteFolderRepository::new(pool);

        let dirty = Folder::new("Dirty", 1_000);
        let mut clean = Folder::new("Clean", 2_000);
        clean.sync_modified = None;
        let mut tombstone = Folder::new("Tombstone", 3_000);
        tombstone.deleted = true;

        repo.upsert(&dirty).await.unwrap();
        repo.upsert(&clean).await.unwrap();
        repo.upsert(&tombstone).await.unwrap();

        let mut to_sync: Vec<String> = repo
            .find_to_sync()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        to_sync.sort();
        assert_eq!(to_sync, vec!["Dirty".to_string(), "Tombstone".to_string()]);

        repo.mark_all_synced().await.unwrap();
        assert!(repo.find_to_sync().await.unwrap().is_empty());
        assert!(repo.find_by_uuid(&tombstone.uuid).await.unwrap().is_none());
    }
}

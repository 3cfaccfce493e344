//! Up-next queue and change-log repository.
//!
//! Two tables back this: the queue itself (ordered uuid list) and the
//! append-only change log. Replacing the queue from a sync import goes
//! through [`UpNextRepository::replace_queue`], which deliberately writes no
//! change-log rows; user edits are logged by the playback layer via
//! [`UpNextRepository::add_change`].

use crate::error::Result;
use crate::models::UpNextChange;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait UpNextRepository: Send + Sync {
    /// The queue, in play order.
    async fn queue_uuids(&self) -> Result<Vec<String>>;

    /// Overwrite the queue with a server-imported episode list. Does not log
    /// changes.
    async fn replace_queue(&self, uuids: &[String]) -> Result<()>;

    /// Append a local queue mutation to the change log.
    async fn add_change(&self, change: &UpNextChange) -> Result<()>;

    /// All buffered changes, oldest first.
    async fn changes(&self) -> Result<Vec<UpNextChange>>;

    /// Drop acknowledged changes. Bounded by the highest uploaded `modified`
    /// timestamp so changes buffered during the network call survive.
    async fn delete_changes_up_to(&self, modified: i64) -> Result<()>;
}

pub struct SqliteUpNextRepository {
    pool: SqlitePool,
}

impl SqliteUpNextRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpNextRepository for SqliteUpNextRepository {
    async fn queue_uuids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            query_as("SELECT episode_uuid FROM up_next_episodes ORDER BY position")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(uuid,)| uuid).collect())
    }

    async fn replace_queue(&self, uuids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM up_next_episodes")
            .execute(&mut *tx)
            .await?;
        for (position, uuid) in uuids.iter().enumerate() {
            sqlx::query("INSERT INTO up_next_episodes (position, episode_uuid) VALUES (?, ?)")
                .bind(position as i64)
                .bind(uuid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn add_change(&self, change: &UpNextChange) -> Result<()> {
        sqlx::query(
            "INSERT INTO up_next_changes (action, uuid, uuids, modified) VALUES (?, ?, ?, ?)",
        )
        .bind(change.action)
        .bind(&change.uuid)
        .bind(&change.uuids)
        .bind(change.modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn changes(&self) -> Result<Vec<UpNextChange>> {
        let changes =
            query_as::<_, UpNextChange>("SELECT * FROM up_next_changes ORDER BY modified, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(changes)
    }

    async fn delete_changes_up_to(&self, modified: i64) -> Result<()> {
        sqlx::query("DELETE FROM up_next_changes WHERE modified <= ?")
            .bind(modified)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::UpNextAction;

    #[tokio::test]
    async fn replace_queue_overwrites_in_order() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUpNextRepository::new(pool);

        repo.replace_queue(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        repo.replace_queue(&["c".to_string(), "a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(
            repo.queue_uuids().await.unwrap(),
            vec!["c".to_string(), "a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn replace_queue_writes_no_change_rows() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUpNextRepository::new(pool);

        repo.replace_queue(&["a".to_string()]).await.unwrap();
        assert!(repo.changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn change_log_ordering_and_bounded_cleanup() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteUpNextRepository::new(pool);

        repo.add_change(&UpNextChange::single(UpNextAction::PlayLast, "e2", 200))
            .await
            .unwrap();
        repo.add_change(&UpNextChange::single(UpNextAction::PlayNow, "e1", 100))
            .await
            .unwrap();
        repo.add_change(&UpNextChange::replace(&["e1".to_string()], 300))
            .await
            .unwrap();

        let changes = repo.changes().await.unwrap();
        assert_eq!(
            changes.iter().map(|c| c.modified).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );
        assert!(changes.iter().all(|c| c.id > 0));

        // Only changes up to the uploaded watermark are dropped.
        repo.delete_changes_up_to(200).await.unwrap();
        let remaining = repo.changes().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].modified, 300);
    }
}

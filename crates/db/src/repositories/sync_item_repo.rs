//! Repository for the `sync_items` table.

use sqlx::{PgConnection, PgPool};
use synchub_core::sync_item::SyncStatus;
use synchub_core::types::{EntityId, Timestamp};

use crate::models::sync_item::{NewSyncItem, SyncItem};

const SYNC_ITEM_COLUMNS: &str = "\
    id, user_id, kind, content, source_device, target_devices, \
    created_at, expires_at, status";

/// Provides create/read and sweep operations for sync items.
pub struct SyncItemRepo;

impl SyncItemRepo {
    /// Insert a new item with the given (already resolved) expiry.
    pub async fn create(
        pool: &PgPool,
        input: &NewSyncItem,
        expires_at: Timestamp,
    ) -> Result<SyncItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_items \
                (id, user_id, kind, content, source_device, target_devices, \
                 created_at, expires_at, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {SYNC_ITEM_COLUMNS}"
        );
        sqlx::query_as::<_, SyncItem>(&query)
            .bind(input.id)
            .bind(&input.user_id)
            .bind(input.kind.as_str())
            .bind(&input.content)
            .bind(input.source_device)
            .bind(&input.target_devices)
            .bind(input.created_at)
            .bind(expires_at)
            .bind(SyncStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Non-expired items of a user, newest first.
    pub async fn list_live(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<SyncItem>, sqlx::Error> {
        let query = format!(
            "SELECT {SYNC_ITEM_COLUMNS} FROM sync_items \
             WHERE user_id = $1 AND expires_at > NOW() \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, SyncItem>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<SyncItem>, sqlx::Error> {
        let query = format!(
            "SELECT {SYNC_ITEM_COLUMNS} FROM sync_items WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, SyncItem>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_delivered(pool: &PgPool, id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sync_items SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id)
            .bind(SyncStatus::Delivered.as_str())
            .bind(SyncStatus::Pending.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag every item past its expiry as `expired`.
    pub async fn mark_expired(conn: &mut PgConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_items SET status = $1 WHERE expires_at < NOW() AND status <> $1",
        )
        .bind(SyncStatus::Expired.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete items whose expiry is older than `grace_secs`.
    pub async fn delete_expired(conn: &mut PgConnection, grace_secs: f64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sync_items WHERE expires_at < NOW() - make_interval(secs => $1)",
        )
        .bind(grace_secs)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}

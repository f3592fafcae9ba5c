//! Repository for the `devices` table.

use sqlx::PgPool;
use synchub_core::types::{EntityId, UserId};

use crate::models::device::{Device, DevicePatch, NewDevice};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const DEVICE_COLUMNS: &str = "\
    id, user_id, name, device_type, platform, capabilities, last_seen, created_at";

/// Provides CRUD operations for devices.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Insert a device, or refresh it if the id exists and belongs to the
    /// same user.
    ///
    /// Returns `None` when the id is owned by a different user: the
    /// conditional `DO UPDATE ... WHERE` leaves the row untouched and
    /// nothing is returned.
    pub async fn upsert(pool: &PgPool, input: &NewDevice) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (id, user_id, name, device_type, platform, capabilities, last_seen) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                device_type = EXCLUDED.device_type, \
                platform = EXCLUDED.platform, \
                capabilities = EXCLUDED.capabilities, \
                last_seen = NOW() \
             WHERE devices.user_id = EXCLUDED.user_id \
             RETURNING {DEVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(input.id)
            .bind(&input.user_id)
            .bind(&input.name)
            .bind(&input.device_type)
            .bind(&input.platform)
            .bind(&input.capabilities)
            .fetch_optional(pool)
            .await
    }

    /// List a user's devices, most recently seen first.
    pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {DEVICE_COLUMNS} FROM devices \
             WHERE user_id = $1 \
             ORDER BY last_seen DESC, id"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Update the mutable fields. `None` fields are left unchanged.
    pub async fn update(
        pool: &PgPool,
        user_id: &str,
        id: EntityId,
        patch: &DevicePatch,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET name = COALESCE($3, name) \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {DEVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .bind(user_id)
            .bind(patch.name.as_deref())
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, user_id: &str, id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM devices WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set `last_seen` to the database clock. `GREATEST` keeps it monotonic.
    pub async fn touch(pool: &PgPool, user_id: &str, id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE devices SET last_seen = GREATEST(last_seen, NOW()) \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner(pool: &PgPool, id: EntityId) -> Result<Option<UserId>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT user_id FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

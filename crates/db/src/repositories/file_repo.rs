//! Repository for the `files` table.

use sqlx::{PgConnection, PgPool};
use synchub_core::types::EntityId;

use crate::models::file::{FileObject, NewFile};
use crate::models::sync_item::ExpiredFile;

const FILE_COLUMNS: &str = "\
    id, user_id, filename, original_name, size, mime_type, path, created_at, expires_at";

/// Provides CRUD operations for uploaded file metadata.
pub struct FileRepo;

impl FileRepo {
    pub async fn create(pool: &PgPool, input: &NewFile) -> Result<FileObject, sqlx::Error> {
        let query = format!(
            "INSERT INTO files \
                (id, user_id, filename, original_name, size, mime_type, path, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {FILE_COLUMNS}"
        );
        sqlx::query_as::<_, FileObject>(&query)
            .bind(input.id)
            .bind(&input.user_id)
            .bind(&input.filename)
            .bind(&input.original_name)
            .bind(input.size)
            .bind(&input.mime_type)
            .bind(&input.path)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a non-expired file owned by `user_id`.
    pub async fn find_live(
        pool: &PgPool,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, sqlx::Error> {
        let query = format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE id = $1 AND user_id = $2 AND expires_at > NOW()"
        );
        sqlx::query_as::<_, FileObject>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(
        pool: &PgPool,
        user_id: &str,
        id: EntityId,
    ) -> Result<Option<FileObject>, sqlx::Error> {
        let query = format!(
            "DELETE FROM files WHERE id = $1 AND user_id = $2 RETURNING {FILE_COLUMNS}"
        );
        sqlx::query_as::<_, FileObject>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_many(pool: &PgPool, ids: &[EntityId]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_expired(conn: &mut PgConnection) -> Result<Vec<ExpiredFile>, sqlx::Error> {
        sqlx::query_as::<_, ExpiredFile>(
            "SELECT id, path FROM files WHERE expires_at < NOW() ORDER BY expires_at",
        )
        .fetch_all(conn)
        .await
    }
}

//! Repository for the `images` table.

use sqlx::PgPool;

use crate::models::image::{CreateImage, ImageRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, category_id, image_data, preview_data, info_data, \
    created_at, updated_at";

/// Provides CRUD operations for generated images.
pub struct ImageRepo;

impl ImageRepo {
    /// Allocate the row for a new job, returning it.
    pub async fn create(pool: &PgPool, input: &CreateImage) -> Result<ImageRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO images (id, owner_id, category_id)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageRow>(&query)
            .bind(&input.id)
            .bind(&input.owner_id)
            .bind(input.category_id)
            .fetch_one(pool)
            .await
    }

    /// Find an image row by job id.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ImageRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM images WHERE id = $1");
        sqlx::query_as::<_, ImageRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Store the final image. Returns `true` if a row was updated.
    pub async fn set_image_data(pool: &PgPool, id: &str, data: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE images SET image_data = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(data)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the latest preview. Returns `true` if a row was updated.
    pub async fn set_preview_data(
        pool: &PgPool,
        id: &str,
        data: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE images SET preview_data = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(data)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cache generation info. Returns `true` if a row was updated.
    pub async fn set_info_data(
        pool: &PgPool,
        id: &str,
        info: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE images SET info_data = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(info)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an image row. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

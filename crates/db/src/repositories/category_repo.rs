//! Repository for the `categories` table.

use navigator_core::types::DbId;
use sqlx::PgPool;

use crate::models::category::{Category, CreateCategory};

const COLUMNS: &str = "id, owner_id, name, created_at, updated_at";

/// Provides CRUD operations for image categories.
pub struct CategoryRepo;

impl CategoryRepo {
    pub async fn create(pool: &PgPool, input: &CreateCategory) -> Result<Category, sqlx::Error> {
        let query = format!(
            "INSERT INTO categories (owner_id, name)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(&input.owner_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = $1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `true` if the category exists and belongs to `owner_id`.
    pub async fn is_owned_by(pool: &PgPool, id: DbId, owner_id: &str) -> Result<bool, sqlx::Error> {
        let owned: Option<bool> = sqlx::query_scalar(
            "SELECT owner_id = $2 FROM categories WHERE id = $1",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
        Ok(owned.unwrap_or(false))
    }
}

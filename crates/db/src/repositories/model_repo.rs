//! Repository for the `models` table.

use sqlx::PgPool;

use crate::models::model::{CreateKnownModel, KnownModel};

const COLUMNS: &str = "id, model_name, friendly_name, description, created_at, updated_at";

/// Provides access to the locally known checkpoints.
pub struct ModelRepo;

impl ModelRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateKnownModel,
    ) -> Result<KnownModel, sqlx::Error> {
        let query = format!(
            "INSERT INTO models (model_name, friendly_name, description)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, KnownModel>(&query)
            .bind(&input.model_name)
            .bind(&input.friendly_name)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// All known models ordered by friendly name.
    pub async fn list(pool: &PgPool) -> Result<Vec<KnownModel>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM models ORDER BY friendly_name");
        sqlx::query_as::<_, KnownModel>(&query)
            .fetch_all(pool)
            .await
    }

    /// Just the friendly names, for model-name validation.
    pub async fn list_friendly_names(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT friendly_name FROM models ORDER BY friendly_name")
            .fetch_all(pool)
            .await
    }
}

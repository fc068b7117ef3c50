use navigator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `models` table: a checkpoint known by a friendly name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KnownModel {
    pub id: DbId,
    pub model_name: String,
    pub friendly_name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a known model.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateKnownModel {
    pub model_name: String,
    pub friendly_name: String,
    pub description: Option<String>,
}

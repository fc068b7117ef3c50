//! Rows of the `images` table: one per generation job.

use navigator_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `images` table.
///
/// `id` is the job id. The image columns hold base64 PNG data.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageRow {
    pub id: String,
    pub owner_id: String,
    pub category_id: Option<DbId>,
    pub image_data: Option<String>,
    pub preview_data: Option<String>,
    pub info_data: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for allocating a job's row.
#[derive(Debug, Clone)]
pub struct CreateImage {
    pub id: String,
    pub owner_id: String,
    pub category_id: Option<DbId>,
}

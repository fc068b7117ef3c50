//! Persistence seam used by the pipeline.
//!
//! The database crate provides the PostgreSQL implementation; tests use an
//! in-memory one.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{DbId, JobId, OwnerId};

/// Row allocated by a producer before a task is queued.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub category_id: Option<DbId>,
}

/// A stored image as returned to the retrieval endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub category_id: Option<DbId>,
    /// Base64 PNG. `None` until the task finished.
    pub image_data: Option<String>,
    /// Base64 preview of the running task, if any was captured.
    pub preview_data: Option<String>,
}

#[async_trait]
pub trait ImageStore: Send + Sync + 'static {
    /// Allocate the row a task's results will be written to.
    async fn create_job_record(&self, record: &NewImageRecord) -> Result<(), CoreError>;

    /// Store the final base64 image.
    async fn write_final_image(&self, job_id: &str, image_data: &str) -> Result<(), CoreError>;

    /// Store the latest base64 preview, replacing any previous one.
    async fn write_preview(&self, job_id: &str, preview_data: &str) -> Result<(), CoreError>;

    async fn get_image_by_id(&self, job_id: &str) -> Result<Option<StoredImage>, CoreError>;

    /// Cached generation info, if any.
    async fn get_image_metadata(&self, job_id: &str)
        -> Result<Option<serde_json::Value>, CoreError>;

    async fn set_image_metadata(
        &self,
        job_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), CoreError>;

    /// Delete the row. Returns `false` when nothing matched.
    async fn delete_image_record(&self, job_id: &str) -> Result<bool, CoreError>;
}

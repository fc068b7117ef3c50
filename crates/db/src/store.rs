//! [`ImageStore`] backed by the `images` table.

use async_trait::async_trait;
use navigator_core::error::CoreError;
use navigator_core::store::{ImageStore, NewImageRecord, StoredImage};
use sqlx::PgPool;

use crate::models::image::{CreateImage, ImageRow};
use crate::repositories::ImageRepo;

#[derive(Clone)]
pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}

fn require_row(updated: bool, job_id: &str) -> Result<(), CoreError> {
    if updated {
        Ok(())
    } else {
        Err(CoreError::NotFound {
            entity: "image",
            id: job_id.to_string(),
        })
    }
}

impl From<ImageRow> for StoredImage {
    fn from(row: ImageRow) -> Self {
        Self {
            job_id: row.id,
            owner_id: row.owner_id,
            category_id: row.category_id,
            image_data: row.image_data,
            preview_data: row.preview_data,
        }
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    async fn create_job_record(&self, record: &NewImageRecord) -> Result<(), CoreError> {
        let input = CreateImage {
            id: record.job_id.clone(),
            owner_id: record.owner_id.clone(),
            category_id: record.category_id,
        };
        ImageRepo::create(&self.pool, &input)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn write_final_image(&self, job_id: &str, image_data: &str) -> Result<(), CoreError> {
        let updated = ImageRepo::set_image_data(&self.pool, job_id, image_data)
            .await
            .map_err(storage_err)?;
        require_row(updated, job_id)
    }

    async fn write_preview(&self, job_id: &str, preview_data: &str) -> Result<(), CoreError> {
        let updated = ImageRepo::set_preview_data(&self.pool, job_id, preview_data)
            .await
            .map_err(storage_err)?;
        require_row(updated, job_id)
    }

    async fn get_image_by_id(&self, job_id: &str) -> Result<Option<StoredImage>, CoreError> {
        let row = ImageRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(storage_err)?;
        Ok(row.map(StoredImage::from))
    }

    async fn get_image_metadata(
        &self,
        job_id: &str,
    ) -> Result<Option<serde_json::Value>, CoreError> {
        let row = ImageRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(storage_err)?;
        Ok(row.and_then(|r| r.info_data))
    }

    async fn set_image_metadata(
        &self,
        job_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), CoreError> {
        let updated = ImageRepo::set_info_data(&self.pool, job_id, metadata)
            .await
            .map_err(storage_err)?;
        require_row(updated, job_id)
    }

    async fn delete_image_record(&self, job_id: &str) -> Result<bool, CoreError> {
        ImageRepo::delete(&self.pool, job_id)
            .await
            .map_err(storage_err)
    }
}

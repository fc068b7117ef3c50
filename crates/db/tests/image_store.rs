use navigator_core::error::CoreError;
use navigator_core::store::{ImageStore, NewImageRecord};
use navigator_db::models::category::CreateCategory;
use navigator_db::models::model::CreateKnownModel;
use navigator_db::repositories::{CategoryRepo, ImageRepo, ModelRepo};
use navigator_db::PgImageStore;
use sqlx::PgPool;

fn record(job_id: &str) -> NewImageRecord {
    NewImageRecord {
        job_id: job_id.to_string(),
        owner_id: "owner-1".to_string(),
        category_id: None,
    }
}

/// Connect, migrate, verify schema.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bootstrap(pool: PgPool) {
    navigator_db::health_check(&pool).await.unwrap();

    for table in ["images", "models", "categories"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_job_record_lifecycle(pool: PgPool) {
    let store = PgImageStore::new(pool.clone());
    store.create_job_record(&record("ab12cd34")).await.unwrap();

    let image = store.get_image_by_id("ab12cd34").await.unwrap().unwrap();
    assert_eq!(image.owner_id, "owner-1");
    assert!(image.image_data.is_none());

    store.write_preview("ab12cd34", "UFJFVklFVw==").await.unwrap();
    store.write_final_image("ab12cd34", "SU1BR0U=").await.unwrap();

    let image = store.get_image_by_id("ab12cd34").await.unwrap().unwrap();
    assert_eq!(image.preview_data.as_deref(), Some("UFJFVklFVw=="));
    assert_eq!(image.image_data.as_deref(), Some("SU1BR0U="));

    assert!(store.delete_image_record("ab12cd34").await.unwrap());
    assert!(!store.delete_image_record("ab12cd34").await.unwrap());
    assert!(store.get_image_by_id("ab12cd34").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_metadata_round_trip(pool: PgPool) {
    let store = PgImageStore::new(pool);
    store.create_job_record(&record("meta0001")).await.unwrap();

    assert!(store.get_image_metadata("meta0001").await.unwrap().is_none());

    let info = serde_json::json!({"info": "Steps: 20", "parameters": {"owner_id": "owner-1"}});
    store.set_image_metadata("meta0001", &info).await.unwrap();

    let cached = store.get_image_metadata("meta0001").await.unwrap().unwrap();
    assert_eq!(cached["parameters"]["owner_id"], "owner-1");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_writes_to_missing_row_are_not_found(pool: PgPool) {
    let store = PgImageStore::new(pool);
    let err = store.write_final_image("missing", "x").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "image", .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_category_ownership_and_listing(pool: PgPool) {
    let category = CategoryRepo::create(
        &pool,
        &CreateCategory {
            owner_id: "owner-1".into(),
            name: "Landscapes".into(),
        },
    )
    .await
    .unwrap();

    assert!(CategoryRepo::is_owned_by(&pool, category.id, "owner-1").await.unwrap());
    assert!(!CategoryRepo::is_owned_by(&pool, category.id, "owner-2").await.unwrap());
    assert!(!CategoryRepo::is_owned_by(&pool, 9999, "owner-1").await.unwrap());

    let store = PgImageStore::new(pool.clone());
    let mut rec = record("cat00001");
    rec.category_id = Some(category.id);
    store.create_job_record(&rec).await.unwrap();
    store.create_job_record(&record("cat00002")).await.unwrap();

    let filed = ImageRepo::find_by_id(&pool, "cat00001").await.unwrap().unwrap();
    assert_eq!(filed.category_id, Some(category.id));
    let loose = ImageRepo::find_by_id(&pool, "cat00002").await.unwrap().unwrap();
    assert_eq!(loose.category_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_known_model_names(pool: PgPool) {
    ModelRepo::create(
        &pool,
        &CreateKnownModel {
            model_name: "sdxl_base_1.0.safetensors".into(),
            friendly_name: "SDXL Base".into(),
            description: None,
        },
    )
    .await
    .unwrap();

    let names = ModelRepo::list_friendly_names(&pool).await.unwrap();
    assert_eq!(names, vec!["SDXL Base".to_string()]);
}

/// Short opaque job identifier. Doubles as the storage key of the image row.
pub type JobId = String;

/// Opaque identifier of whoever submitted a job (e.g. a Discord user id).
pub type OwnerId = String;

/// Database primary keys for auxiliary tables (categories, models).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Prefix of the correlation token attached to every backend generation call.
pub const CORRELATION_PREFIX: &str = "navigator-";

/// Length of generated job ids.
const JOB_ID_LEN: usize = 8;

/// Generate a fresh job id (first 8 hex characters of a UUID v4).
pub fn generate_job_id() -> JobId {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(JOB_ID_LEN);
    id
}

/// The `force_task_id` / `id_task` value the backend knows this job by.
pub fn correlation_token(job_id: &str) -> String {
    format!("{CORRELATION_PREFIX}{job_id}")
}

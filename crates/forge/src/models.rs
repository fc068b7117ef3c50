//! Response types returned by the Forge REST API.
//!
//! Only the fields Navigator reads are modelled. Unknown fields are
//! ignored by serde.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upscaler {
    pub name: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
}

/// A checkpoint known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdModel {
    pub title: String,
    pub model_name: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// An additional module (VAE, text encoder) that can be loaded next to a
/// checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdModule {
    pub model_name: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Subset of `GET /options`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgeOptions {
    #[serde(default)]
    pub sd_model_checkpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub sampling_step: u32,
    #[serde(default)]
    pub sampling_steps: u32,
}

/// `GET /progress`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressResponse {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub eta_relative: f64,
    #[serde(default)]
    pub state: ProgressState,
    /// Base64 live preview. Absent while the backend warms up.
    #[serde(default)]
    pub current_image: Option<String>,
}

/// `POST /internal/progress`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InternalProgress {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub queued: bool,
    #[serde(default)]
    pub completed: bool,
}

/// Body returned by `txt2img` and `img2img`.
///
/// Forge sends `"images": null` when a run produced nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    /// JSON-encoded generation info (a string, not an object).
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl GenerationResponse {
    /// Seed the backend actually used, when the info blob carries one.
    pub fn seed(&self) -> Option<i64> {
        serde_json::from_str::<serde_json::Value>(&self.info)
            .ok()?
            .get("seed")?
            .as_i64()
    }
}

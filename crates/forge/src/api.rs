//! REST API client for the Forge HTTP endpoints.
//!
//! Wraps the `/sdapi/v1` API (generation, progress, interruption, catalog
//! listings) plus the UI-internal progress probe using [`reqwest`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{
    ForgeOptions, GenerationResponse, InternalProgress, ProgressResponse, Sampler, Scheduler,
    SdModel, SdModule, Upscaler,
};

/// Path of the versioned REST API below the backend root.
pub const API_PREFIX: &str = "/sdapi/v1";

/// HTTP client for a single Forge instance.
#[derive(Clone)]
pub struct ForgeApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the Forge REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ForgeApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Forge returned a non-2xx status code.
    #[error("Forge API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was not the JSON shape we expected.
    #[error("Unexpected response from Forge: {0}")]
    Decode(String),

    /// A catalog listing came back empty where a fallback entry is needed.
    #[error("Forge returned no {0}")]
    EmptyCatalog(&'static str),
}

impl ForgeApi {
    /// Create a new API client for a Forge instance.
    ///
    /// * `base_url` - Root URL of the backend, e.g. `http://host:7860`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}/{path}", self.base_url)
    }

    // ---- catalog ----

    pub async fn samplers(&self) -> Result<Vec<Sampler>, ForgeApiError> {
        self.get_json("samplers").await
    }

    pub async fn schedulers(&self) -> Result<Vec<Scheduler>, ForgeApiError> {
        self.get_json("schedulers").await
    }

    pub async fn upscalers(&self) -> Result<Vec<Upscaler>, ForgeApiError> {
        self.get_json("upscalers").await
    }

    pub async fn sd_models(&self) -> Result<Vec<SdModel>, ForgeApiError> {
        self.get_json("sd-models").await
    }

    pub async fn sd_modules(&self) -> Result<Vec<SdModule>, ForgeApiError> {
        self.get_json("sd-modules").await
    }

    pub async fn options(&self) -> Result<ForgeOptions, ForgeApiError> {
        self.get_json("options").await
    }

    /// Ask Forge to rescan its checkpoint directory.
    pub async fn refresh_checkpoints(&self) -> Result<(), ForgeApiError> {
        let response = self
            .client
            .post(self.api_url("refresh-checkpoints"))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- generation ----

    /// Run a text-to-image generation. Resolves only once Forge is done.
    pub async fn txt2img<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<GenerationResponse, ForgeApiError> {
        self.post_json("txt2img", payload).await
    }

    /// Run an image-to-image generation. Resolves only once Forge is done.
    pub async fn img2img<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<GenerationResponse, ForgeApiError> {
        self.post_json("img2img", payload).await
    }

    /// Global progress of whatever Forge is currently running.
    pub async fn progress(&self) -> Result<ProgressResponse, ForgeApiError> {
        self.get_json("progress").await
    }

    /// Ask Forge whether it is working on the task tagged `id_task`.
    ///
    /// This lives outside the versioned API prefix.
    pub async fn internal_progress(&self, id_task: &str) -> Result<InternalProgress, ForgeApiError> {
        let body = serde_json::json!({
            "id_task": id_task,
            "live_preview": false,
            "id_live_preview": -1,
        });

        let response = self
            .client
            .post(format!("{}/internal/progress", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Interrupt the currently running generation.
    ///
    /// This does not target a specific task -- it interrupts whatever is
    /// executing right now.
    pub async fn interrupt(&self) -> Result<(), ForgeApiError> {
        let response = self.client.post(self.api_url("interrupt")).send().await?;
        Self::check_status(response).await
    }

    /// Free the loaded checkpoint's memory. The next generation reloads it.
    pub async fn unload_checkpoint(&self) -> Result<(), ForgeApiError> {
        let response = self
            .client
            .post(self.api_url("unload-checkpoint"))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Extract the generation parameters embedded in a base64 PNG.
    pub async fn png_info(&self, image: &str) -> Result<serde_json::Value, ForgeApiError> {
        self.post_json("png-info", &serde_json::json!({ "image": image }))
            .await
    }

    // ---- private helpers ----

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ForgeApiError> {
        let response = self.client.get(self.api_url(path)).send().await?;
        Self::parse_response(response).await
    }

    async fn post_json<T: DeserializeOwned, P: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<T, ForgeApiError> {
        let response = self
            .client
            .post(self.api_url(path))
            .json(payload)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ForgeApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ForgeApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ForgeApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ForgeApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ForgeApiError::Decode(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ForgeApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

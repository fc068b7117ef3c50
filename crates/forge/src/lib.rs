//! Client library for the Forge (SD WebUI compatible) generation backend.
//!
//! Provides typed REST wrappers, request payload builders, parsing of the
//! generation-info text Forge embeds in its images, and the catalog
//! lookups used to normalise sampler, scheduler, upscaler and model names.

pub mod api;
pub mod backend;
pub mod catalog;
pub mod info;
pub mod models;
pub mod payload;
pub mod scripts;

pub use api::{ForgeApi, ForgeApiError};
pub use backend::GenerationBackend;
pub use catalog::ParameterResolver;

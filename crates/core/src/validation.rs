//! Producer-side request validation.
//!
//! These checks run before a task is created. Anything that fails here is
//! reported to the caller as a 400 and never reaches the queue.

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Default ceiling on `width * height` (2560 x 1440).
pub const DEFAULT_PIXEL_LIMIT: u64 = 3_686_400;

/// Largest number of sampling steps accepted for img2img jobs.
pub const MAX_IMG2IMG_STEPS: u32 = 75;

/* --------------------------------------------------------------------------
Validation functions
-------------------------------------------------------------------------- */

/// Reject requests whose area exceeds `limit`.
pub fn validate_pixel_count(width: u32, height: u32, limit: u64) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Width and height must be greater than 0".to_string(),
        ));
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > limit {
        return Err(CoreError::Validation(format!(
            "Requested image size ({width}x{height}) exceeds the pixel limit of {limit}"
        )));
    }
    Ok(())
}

/// Reject upscale re-queues whose 2x output would exceed `limit`.
pub fn validate_upscale_pixel_count(width: u32, height: u32, limit: u64) -> Result<(), CoreError> {
    let pixels = u64::from(width) * 2 * u64::from(height) * 2;
    if pixels > limit {
        return Err(CoreError::Validation(format!(
            "Upscaled image size ({}x{}) exceeds the pixel limit of {limit}",
            width * 2,
            height * 2
        )));
    }
    Ok(())
}

/// Every job needs a model and a prompt.
pub fn validate_required_params(model_name: &str, prompt: &str) -> Result<(), CoreError> {
    if model_name.trim().is_empty() || prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Missing required parameters: model_name and prompt".to_string(),
        ));
    }
    Ok(())
}

/// Denoising strength must lie in `[0, 1]`.
pub fn validate_denoising_strength(value: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "Denoising strength must be between 0 and 1 (got {value})"
        )));
    }
    Ok(())
}

/// Steps must be positive.
pub fn validate_steps(steps: u32) -> Result<(), CoreError> {
    if steps == 0 {
        return Err(CoreError::Validation(
            "Steps must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

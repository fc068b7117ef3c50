//! Parsing of the generation info Forge embeds in PNG metadata.
//!
//! `POST /png-info` returns `{ "info": "<text>", "parameters": { ... } }`.
//! The text holds `Key: value` pairs separated by commas; the parameters
//! object is Forge's own parse of the same text. Numeric values may come
//! back either as numbers or as strings.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use navigator_core::task::{Subseed, DEFAULT_DISTILLED_CFG};

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Model: ([^,\n]+)").expect("valid regex"));

static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Module \d+:\s*([^,]+)").expect("valid regex"));

/// Checkpoint name from the info text (`"Model: name"`).
pub fn parse_model_name(info: &str) -> Option<String> {
    MODEL_RE
        .captures(info)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Additional modules from the info text (`"Module 1: ae"`), each with a
/// `.safetensors` suffix so they can be fed back into a request.
pub fn parse_modules(info: &str) -> Vec<String> {
    MODULE_RE
        .captures_iter(info)
        .filter_map(|c| c.get(1))
        .map(|m| format!("{}.safetensors", m.as_str().trim()))
        .collect()
}

/// Generation parameters recovered from a stored image.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredParams {
    pub model_name: Option<String>,
    pub modules: Vec<String>,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub steps: u32,
    pub cfg_scale: f64,
    pub distilled_cfg: f64,
    pub sampler_name: Option<String>,
    pub scheduler_name: Option<String>,
    pub denoising_strength: Option<f64>,
    pub subseed: Option<Subseed>,
    pub image_enhancements: bool,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "True",
        _ => false,
    }
}

impl RecoveredParams {
    /// Read parameters from a `png-info` response.
    ///
    /// Returns `None` when the size is missing, since nothing sensible can
    /// be re-queued without it.
    pub fn from_png_info(png_info: &Value) -> Option<Self> {
        let params = png_info.get("parameters")?;
        let info = png_info.get("info").and_then(Value::as_str).unwrap_or("");

        let width = number(params.get("Size-1"))? as u32;
        let height = number(params.get("Size-2"))? as u32;

        let subseed = Subseed::from_parts(
            number(params.get("Variation seed")).map(|v| v as i64),
            number(params.get("Variation strength")),
        );

        Some(Self {
            model_name: parse_model_name(info),
            modules: parse_modules(info),
            prompt: string(params.get("Prompt")).unwrap_or_default(),
            negative_prompt: string(params.get("Negative prompt")).unwrap_or_default(),
            width,
            height,
            seed: number(params.get("Seed")).map_or(-1, |v| v as i64),
            steps: number(params.get("Steps")).map_or(0, |v| v as u32),
            cfg_scale: number(params.get("CFG scale")).unwrap_or(0.0),
            distilled_cfg: number(params.get("distilled_cfg")).unwrap_or(DEFAULT_DISTILLED_CFG),
            sampler_name: string(params.get("Sampler")),
            scheduler_name: string(params.get("Schedule type")),
            denoising_strength: number(params.get("Denoising strength")),
            subseed,
            image_enhancements: flag(params.get("freeu_enabled"))
                || flag(params.get("sag_enabled")),
        })
    }
}

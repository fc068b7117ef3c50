//! Always-on scripts: built-in Forge extensions toggled per request.

use serde_json::{json, Map, Value};

pub const FREEU_SCRIPT: &str = "FreeU Integrated (SD 1.x, SD 2.x, SDXL)";
pub const SAG_SCRIPT: &str = "SelfAttentionGuidance Integrated (SD 1.x, SD 2.x, SDXL)";

/// Build the `alwayson_scripts` object Forge expects.
///
/// FreeU args: enabled, B1, B2, S1, S2, start step, end step (SDXL preset).
/// SAG args: enabled, scale, blur sigma, blur mask threshold.
pub fn always_on_scripts(free_u: bool, self_attention_guidance: bool) -> Value {
    let mut scripts = Map::new();
    if free_u {
        scripts.insert(
            FREEU_SCRIPT.to_string(),
            json!({ "args": [true, 1.1, 1.2, 0.6, 0.4, 0, 1] }),
        );
    }
    if self_attention_guidance {
        scripts.insert(
            SAG_SCRIPT.to_string(),
            json!({ "args": [true, 0.5, 2, 1] }),
        );
    }
    Value::Object(scripts)
}

/// The enhancement preset used for `image_enhancements: true`.
pub fn enhancement_scripts() -> Value {
    always_on_scripts(true, true)
}

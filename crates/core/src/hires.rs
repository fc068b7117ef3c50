//! Resolution-dependent upscale ("HR-fix") policy.
//!
//! Large requests are rendered at half size and upscaled in a second pass;
//! callers may also force a 2x second pass on any request. Pure functions
//! only, so the policy can be exercised without a backend.

use crate::task::Txt2ImgParams;

/// Area above which HR-fix activates on its own.
pub const AUTO_HR_PIXEL_THRESHOLD: u64 = 1024 * 1024;

/// Denoising used for the second pass when the caller did not pick one.
pub const DEFAULT_HR_DENOISING: f64 = 0.35;

/// Upper bound on second-pass steps when HR-fix auto-activates.
pub const AUTO_HR_MAX_STEPS: u32 = 30;

/// `min(max(value, lo), hi)`.
///
/// Unlike [`Ord::clamp`] this never panics when `lo > hi`; the upper bound
/// wins.
pub fn clamp<T: PartialOrd>(value: T, lo: T, hi: T) -> T {
    let raised = if value < lo { lo } else { value };
    if raised > hi {
        hi
    } else {
        raised
    }
}

/// How HR-fix was decided for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrFixMode {
    Disabled,
    /// Explicitly requested via `force_hr_fix`.
    Forced,
    /// Triggered by the requested area.
    Auto,
}

/// Second-pass settings sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrUpscale {
    pub resize_x: u32,
    pub resize_y: u32,
    pub second_pass_steps: u32,
    pub denoising_strength: f64,
}

/// Outcome of [`resolve_hr_fix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrFixPlan {
    pub mode: HrFixMode,
    /// First-pass width actually sent as `width`.
    pub base_width: u32,
    /// First-pass height actually sent as `height`.
    pub base_height: u32,
    /// `None` when `mode` is [`HrFixMode::Disabled`].
    pub upscale: Option<HrUpscale>,
}

impl HrFixPlan {
    pub fn is_enabled(&self) -> bool {
        self.upscale.is_some()
    }
}

fn denoising_or_default(requested: f64) -> f64 {
    if requested > 0.0 {
        requested
    } else {
        DEFAULT_HR_DENOISING
    }
}

/// Decide HR-fix for a text-to-image request.
///
/// A forced request keeps its base size and upscales 2x. An oversized
/// request is halved (rounding up) and upscaled back to the requested size.
/// A non-zero denoising strength alone does not enable HR-fix.
pub fn resolve_hr_fix(params: &Txt2ImgParams) -> HrFixPlan {
    let (width, height) = (params.width, params.height);

    if params.force_hr_fix {
        return HrFixPlan {
            mode: HrFixMode::Forced,
            base_width: width,
            base_height: height,
            upscale: Some(HrUpscale {
                resize_x: width.saturating_mul(2),
                resize_y: height.saturating_mul(2),
                second_pass_steps: clamp(params.hrf_steps, 1, params.steps.max(1)),
                denoising_strength: denoising_or_default(params.denoising_strength),
            }),
        };
    }

    let area = u64::from(width) * u64::from(height);
    if area > AUTO_HR_PIXEL_THRESHOLD {
        return HrFixPlan {
            mode: HrFixMode::Auto,
            base_width: width.div_ceil(2),
            base_height: height.div_ceil(2),
            upscale: Some(HrUpscale {
                resize_x: width,
                resize_y: height,
                second_pass_steps: clamp(params.steps, 1, AUTO_HR_MAX_STEPS),
                denoising_strength: denoising_or_default(params.denoising_strength),
            }),
        };
    }

    HrFixPlan {
        mode: HrFixMode::Disabled,
        base_width: width,
        base_height: height,
        upscale: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(width: u32, height: u32) -> Txt2ImgParams {
        let mut p = Txt2ImgParams::new("model", "prompt");
        p.width = width;
        p.height = height;
        p
    }

    // -----------------------------------------------------------------------
    // clamp
    // -----------------------------------------------------------------------

    #[test]
    fn clamp_inside_range_is_identity() {
        assert_eq!(clamp(5, 1, 10), 5);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(0, 1, 10), 1);
        assert_eq!(clamp(11, 1, 10), 10);
        assert_eq!(clamp(0.9, 0.0, 0.5), 0.5);
    }

    #[test]
    fn clamp_result_never_exceeds_hi() {
        for v in 0..50u32 {
            for hi in 1..20u32 {
                let r = clamp(v, 1, hi);
                assert!(r <= hi && r >= 1);
            }
        }
    }

    #[test]
    fn clamp_with_inverted_bounds_returns_hi() {
        assert_eq!(clamp(5, 10, 3), 3);
    }

    // -----------------------------------------------------------------------
    // resolve_hr_fix
    // -----------------------------------------------------------------------

    #[test]
    fn small_request_is_untouched() {
        let plan = resolve_hr_fix(&params(512, 512));
        assert_eq!(plan.mode, HrFixMode::Disabled);
        assert_eq!((plan.base_width, plan.base_height), (512, 512));
        assert!(!plan.is_enabled());
    }

    #[test]
    fn exactly_at_threshold_is_not_auto() {
        let plan = resolve_hr_fix(&params(1024, 1024));
        assert_eq!(plan.mode, HrFixMode::Disabled);
    }

    #[test]
    fn auto_halves_base_and_upscales_to_request() {
        let plan = resolve_hr_fix(&params(1200, 1200));
        assert_eq!(plan.mode, HrFixMode::Auto);
        assert_eq!((plan.base_width, plan.base_height), (600, 600));
        let up = plan.upscale.unwrap();
        assert_eq!((up.resize_x, up.resize_y), (1200, 1200));
        assert_eq!(up.denoising_strength, DEFAULT_HR_DENOISING);
        assert_eq!(up.second_pass_steps, 30);
    }

    #[test]
    fn auto_rounds_odd_dimensions_up() {
        let plan = resolve_hr_fix(&params(1201, 1025));
        assert_eq!((plan.base_width, plan.base_height), (601, 513));
    }

    #[test]
    fn auto_keeps_few_steps() {
        let mut p = params(1536, 1024);
        p.steps = 12;
        let up = resolve_hr_fix(&p).upscale.unwrap();
        assert_eq!(up.second_pass_steps, 12);
    }

    #[test]
    fn forced_doubles_and_clamps_steps() {
        let mut p = params(512, 512);
        p.force_hr_fix = true;
        p.steps = 20;
        p.hrf_steps = 40;
        let plan = resolve_hr_fix(&p);
        assert_eq!(plan.mode, HrFixMode::Forced);
        assert_eq!((plan.base_width, plan.base_height), (512, 512));
        let up = plan.upscale.unwrap();
        assert_eq!((up.resize_x, up.resize_y), (1024, 1024));
        assert_eq!(up.second_pass_steps, 20);
    }

    #[test]
    fn forced_zero_hrf_steps_becomes_one() {
        let mut p = params(512, 768);
        p.force_hr_fix = true;
        p.hrf_steps = 0;
        let up = resolve_hr_fix(&p).upscale.unwrap();
        assert_eq!(up.second_pass_steps, 1);
        assert_eq!((up.resize_x, up.resize_y), (1024, 1536));
    }

    #[test]
    fn explicit_denoising_is_kept() {
        let mut p = params(512, 512);
        p.force_hr_fix = true;
        p.denoising_strength = 0.6;
        assert_eq!(resolve_hr_fix(&p).upscale.unwrap().denoising_strength, 0.6);
    }

    #[test]
    fn denoising_alone_does_not_enable() {
        let mut p = params(512, 512);
        p.denoising_strength = 0.5;
        assert_eq!(resolve_hr_fix(&p).mode, HrFixMode::Disabled);
    }

    #[test]
    fn forced_wins_over_auto() {
        let mut p = params(1200, 1200);
        p.force_hr_fix = true;
        let plan = resolve_hr_fix(&p);
        assert_eq!(plan.mode, HrFixMode::Forced);
        assert_eq!(plan.upscale.unwrap().resize_x, 2400);
    }
}

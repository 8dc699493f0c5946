//! ReelMaster mastering stages
//!
//! Every stage is a pure `&AudioBuffer -> AudioBuffer` transform. Stages that
//! need floating-point math normalize to [-1, 1], process, then clip and
//! requantize to the buffer's bit depth.
//!
//! ## Signal flow
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────┐   ┌───────────┐   ┌─────────┐
//! │ Zero-cross│ → │ HP / LP  │ → │ Tilt │ → │ Mid/Side  │ → │ Widener │
//! │ trim      │   │ (1-pole) │   │      │   │ side HP   │   │ (Haas)  │
//! └───────────┘   └──────────┘   └──────┘   └───────────┘   └─────────┘
//!        ┌────────────────┐   ┌───────────────────────┐   ┌──────┐   ┌────────┐
//!      → │ Loudness match │ → │ Soft clip + limit     │ → │ Fade │ → │ Dither │
//!        │ (LUFS+ceiling) │   │  or headroom normalize│   │      │   │        │
//!        └────────────────┘   └───────────────────────┘   └──────┘   └────────┘
//! ```

pub mod dither;
pub mod dynamics;
pub mod fade;
pub mod filter;
pub mod loudness;
pub mod stereo;
pub mod zero_crossing;

pub use dither::{DitherMode, apply_dither};
pub use dynamics::{SoftClipper, limit, normalize_headroom, soft_clip};
pub use fade::{fade, fade_in, fade_out};
pub use filter::{
    OnePoleFilter, TiltFilter, high_pass, high_pass_plane, low_pass, low_pass_plane, tilt,
};
pub use loudness::{
    Advisory, LoudnessMatcher, LoudnessMeter, LoudnessReport, MatchOutcome, MatchResult,
    MonoCompatibility, analyze, check_mono_compatibility, loudness_advisory, match_target, measure,
};
pub use stereo::{MidSide, MidSideProcessor, StereoWidener};
pub use zero_crossing::{ZeroCrossingTrim, locate, trim_to_zero_crossings};

pub use rm_core::{AudioBuffer, BitDepth, CoreError, CoreResult, Sample};

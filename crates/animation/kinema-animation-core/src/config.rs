//! Core configuration for kinema-animation-core.

use serde::{Deserialize, Serialize};

/// Default frame duration used for the first frame after waking and in
/// manual timing mode.
pub const DEFAULT_FRAME_MS: f64 = 1000.0 / 60.0;

/// How the reduced-motion preference of the environment is applied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReducedMotionPolicy {
    /// Follow the environment preference.
    #[default]
    User,
    Always,
    Never,
}

/// Engine-wide timing and feature flags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Advance time explicitly in fixed steps instead of reading the clock.
    pub use_manual_timing: bool,

    /// Upper clamp for the per-frame delta, in milliseconds.
    pub max_elapsed_ms: f64,

    /// Complete every animation on the next update phase.
    pub instant_animations: bool,

    /// Like `instant_animations`, also skipping delays.
    pub skip_animations: bool,

    pub reduced_motion: ReducedMotionPolicy,

    /// Samples further apart than this produce zero velocity.
    pub velocity_window_ms: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            use_manual_timing: false,
            max_elapsed_ms: 40.0,
            instant_animations: false,
            skip_animations: false,
            reduced_motion: ReducedMotionPolicy::User,
            velocity_window_ms: 30.0,
        }
    }
}

impl MotionConfig {
    /// Deterministic timing for tests and offline rendering.
    pub fn manual() -> Self {
        Self {
            use_manual_timing: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        serde_json::from_str(s).map_err(|e| crate::AnimationError::Serialization {
            reason: e.to_string(),
        })
    }
}

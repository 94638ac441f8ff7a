//! Defaults for layout animations.

use kinema_animation_core::{Easing, Transition};
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// Layout transition used when a node sets none.
pub const DEFAULT_LAYOUT_DURATION_S: f64 = 0.45;
pub const DEFAULT_LAYOUT_EASE: [f64; 4] = [0.4, 0.0, 0.1, 1.0];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionConfig {
    pub layout_transition: Transition,

    /// Whether shared-layout members crossfade unless a node opts out.
    pub crossfade: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            layout_transition: Transition::tween(DEFAULT_LAYOUT_DURATION_S, Easing::CubicBezier(DEFAULT_LAYOUT_EASE)),
            crossfade: true,
        }
    }
}

impl ProjectionConfig {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        serde_json::from_str(s).map_err(|e| ProjectionError::Serialization {
            reason: e.to_string(),
        })
    }
}

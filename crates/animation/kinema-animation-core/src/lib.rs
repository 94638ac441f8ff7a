//! Kinema Animation Core
//!
//! A frame-batched animation runtime: an eight-phase frame loop, motion
//! values with velocity tracking, keyframe/spring/inertia generators, and
//! controllers that drive them either in software or through a host's
//! native animator. Keyframes that need the DOM-like host (wildcards, CSS
//! variables, unit conversion) are resolved in batches before playback.

pub mod animation;
pub mod config;
pub mod easing;
pub mod element;
pub mod engine;
pub mod error;
pub mod frameloop;
pub mod generators;
pub mod ids;
pub mod interpolate;
pub mod motion_value;
pub mod resolver;
pub mod subscription;

// Re-exports for hosts
pub use animation::{
    animate, animate_value, AnimateOptions, AnimationCallbacks, AnimationHandle, AnimationPlaybackControls,
    AnimationState, AnimationType, HandoffSource, HandoffTable, JsAnimation, NativeAnimation, NativeAnimator,
    RepeatType, Transition,
};
pub use config::{MotionConfig, ReducedMotionPolicy};
pub use easing::{EaseSpec, Easing};
pub use element::{ElementAdapter, ElementKind, MotionElement, RenderState, VisualElement};
pub use engine::{Engine, EngineBuilder, Environment};
pub use error::{AnimationError, Result};
pub use frameloop::{Clock, FrameData, FrameHost, Frameloop, ManualClock, Phase, Process};
pub use motion_value::MotionValue;
pub use resolver::{KeyframeResolver, ResolverQueue};
pub use subscription::Subscription;
pub use kinema_api_core::{Value, ValueKind};

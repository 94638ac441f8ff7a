//! Kinema Projection Core
//!
//! Layout animation by projection. Elements are measured before and after
//! a host layout change, then drawn at their old box and animated to the
//! new one with transforms alone. Nested projections are corrected for
//! their ancestors' scale, and nodes sharing a layout id hand the
//! animation over to each other through a [`NodeStack`].

pub mod config;
pub mod drag;
pub mod error;
pub mod geometry;
pub mod mix;
pub mod node;
pub mod stack;
pub mod styles;
pub mod transform;
pub mod tree;

// Re-exports for hosts
pub use config::ProjectionConfig;
pub use drag::{scale_position_within_constraints, DragConstraints, DragDirection};
pub use error::{ProjectionError, Result};
pub use node::{LayoutAnimationType, Measurements, NodeId, NodeOptions, ProjectionElement};
pub use stack::NodeStack;
pub use styles::{ScaleContext, ScaleCorrector, ScaleCorrectors, StyleMap};
pub use tree::{ProjectionTree, PromoteOptions};

//! Projection node state. Nodes live in the tree's arena and refer to each
//! other by [`NodeId`].

use std::fmt;
use std::rc::Rc;

use kinema_animation_core::{AnimationHandle, MotionValue, Process, Transition};
use kinema_api_core::{Delta, LayoutBox, Point, ValueMap};
use serde::{Deserialize, Serialize};

use crate::styles::StyleMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Host element behind a projection node.
///
/// Implementations must not call back into the tree.
pub trait ProjectionElement {
    /// Bounding box in viewport coordinates, with transforms applied.
    fn measure_viewport_box(&self) -> LayoutBox;

    /// Drop the projection transform so the next measurement sees layout.
    fn reset_transform(&self) {}

    fn measure_scroll(&self) -> Point {
        Point::default()
    }

    /// Whether this element scrolls the whole viewport.
    fn is_scroll_root(&self) -> bool {
        false
    }

    /// Commit projection styles.
    fn render(&self, styles: &StyleMap);
}

/// Which parts of a layout change animate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAnimationType {
    #[default]
    Both,
    Position,
    Size,
    /// Position only, unless the aspect ratio is kept.
    PreserveAspect,
}

type Callback = Rc<dyn Fn()>;

#[derive(Clone)]
pub struct NodeOptions {
    /// Animate layout changes of this node.
    pub layout: bool,
    /// Shared layout identity. Nodes with the same id form a stack.
    pub layout_id: Option<String>,
    pub animation_type: LayoutAnimationType,
    /// Layout changes inside are measured relative to this node, which
    /// itself snaps instantly.
    pub layout_root: bool,
    /// This node scrolls its children.
    pub layout_scroll: bool,
    pub always_measure_layout: bool,
    /// Crossfade with other stack members. `None` follows the tree default.
    pub crossfade: Option<bool>,
    pub transition: Option<Transition>,
    pub pointer_events: Option<String>,
    /// Whether the element is still present, or is exiting.
    pub is_present: bool,
    pub on_exit_complete: Option<Callback>,
    pub on_layout_animation_start: Option<Callback>,
    pub on_layout_animation_complete: Option<Callback>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            layout: false,
            layout_id: None,
            animation_type: LayoutAnimationType::Both,
            layout_root: false,
            layout_scroll: false,
            always_measure_layout: false,
            crossfade: None,
            transition: None,
            pointer_events: None,
            is_present: true,
            on_exit_complete: None,
            on_layout_animation_start: None,
            on_layout_animation_complete: None,
        }
    }
}

impl NodeOptions {
    pub fn layout() -> Self {
        Self {
            layout: true,
            ..Self::default()
        }
    }

    pub fn shared(layout_id: impl Into<String>) -> Self {
        Self {
            layout_id: Some(layout_id.into()),
            ..Self::default()
        }
    }

    /// Whether layout changes of this node are animated at all.
    pub fn animates_layout(&self) -> bool {
        self.layout || self.layout_id.is_some()
    }
}

impl fmt::Debug for NodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeOptions")
            .field("layout", &self.layout)
            .field("layout_id", &self.layout_id)
            .field("animation_type", &self.animation_type)
            .field("layout_root", &self.layout_root)
            .field("layout_scroll", &self.layout_scroll)
            .field("crossfade", &self.crossfade)
            .field("is_present", &self.is_present)
            .finish_non_exhaustive()
    }
}

/// A measurement of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurements {
    pub animation_id: u64,
    /// Box as measured, transforms included.
    pub measured_box: LayoutBox,
    /// Box with scroll and transforms removed.
    pub layout_box: LayoutBox,
    /// Values the measured element rendered with.
    pub latest_values: ValueMap,
    /// The node that was measured.
    pub source: NodeId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScrollPhase {
    Snapshot,
    Measure,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScrollState {
    pub animation_id: u64,
    pub phase: ScrollPhase,
    pub is_root: bool,
    pub offset: Point,
    pub was_root: bool,
}

/// Crossfade and delta interpolation state captured when a layout
/// animation starts.
#[derive(Clone, Debug)]
pub(crate) struct LayoutMix {
    /// Delta from the new layout back to the snapshot.
    pub delta: Delta,
    pub target_delta: Delta,
    pub snapshot_latest_values: ValueMap,
    pub mixed_values: ValueMap,
    pub is_shared: bool,
    pub crossfade_opacity: bool,
    pub is_only_member: bool,
    pub prev_relative_target: Option<LayoutBox>,
}

pub(crate) struct ProjectionNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub element: Option<Rc<dyn ProjectionElement>>,
    /// Unmounted, kept only while another node resumes from it.
    pub detached: bool,
    pub options: NodeOptions,
    pub latest_values: ValueMap,
    pub animation_values: Option<ValueMap>,

    pub snapshot: Option<Measurements>,
    pub layout: Option<Measurements>,
    pub target_layout: Option<LayoutBox>,
    pub scroll: Option<ScrollState>,

    pub target: Option<LayoutBox>,
    pub target_delta: Option<Delta>,
    pub relative_target: Option<LayoutBox>,
    pub relative_target_origin: Option<LayoutBox>,
    pub relative_parent: Option<NodeId>,
    pub layout_corrected: LayoutBox,
    pub projection_delta: Option<Delta>,
    pub prev_projection_delta: Option<Delta>,
    pub tree_scale: Point,

    pub is_layout_dirty: bool,
    pub is_projection_dirty: bool,
    pub is_shared_projection_dirty: bool,
    pub is_transform_dirty: bool,
    pub should_reset_transform: bool,
    pub is_tree_animating: bool,
    pub attempt_to_resolve_relative_target: bool,
    pub resolved_relative_target_at: Option<f64>,

    pub is_visible: bool,
    pub needs_reset: bool,
    pub needs_render: bool,
    pub has_projected: bool,
    pub preserve_opacity: bool,
    /// Hide once the lead resuming from this node passes the midpoint.
    pub hide_at_midpoint: bool,

    pub resume_from: Option<NodeId>,
    pub resuming_from: Option<NodeId>,
    /// Transition for the next layout animation only, set on promotion.
    pub transition_override: Option<Transition>,

    pub animation_progress: f64,
    pub progress: Option<MotionValue>,
    pub current_animation: Option<AnimationHandle>,
    pub pending_animation: Option<Process>,
    pub mix: Option<LayoutMix>,
}

impl ProjectionNode {
    pub fn new(id: NodeId, parent: Option<NodeId>, depth: usize, latest_values: ValueMap) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            depth,
            element: None,
            detached: false,
            options: NodeOptions::default(),
            latest_values,
            animation_values: None,
            snapshot: None,
            layout: None,
            target_layout: None,
            scroll: None,
            target: None,
            target_delta: None,
            relative_target: None,
            relative_target_origin: None,
            relative_parent: None,
            layout_corrected: LayoutBox::default(),
            projection_delta: None,
            prev_projection_delta: None,
            tree_scale: Point { x: 1.0, y: 1.0 },
            is_layout_dirty: false,
            is_projection_dirty: false,
            is_shared_projection_dirty: false,
            is_transform_dirty: false,
            should_reset_transform: false,
            is_tree_animating: false,
            attempt_to_resolve_relative_target: false,
            resolved_relative_target_at: None,
            is_visible: true,
            needs_reset: false,
            needs_render: false,
            has_projected: false,
            preserve_opacity: false,
            hide_at_midpoint: false,
            resume_from: None,
            resuming_from: None,
            transition_override: None,
            animation_progress: 0.0,
            progress: None,
            current_animation: None,
            pending_animation: None,
            mix: None,
        }
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.element.is_some()
    }

    /// Whether this node has something to project onto its layout.
    pub fn is_projecting(&self) -> bool {
        (self.relative_target.is_some() || self.target_delta.is_some() || self.options.layout_root)
            && self.layout.is_some()
    }

    #[inline]
    pub fn schedule_render(&mut self) {
        self.needs_render = true;
    }

    pub fn set_target_delta(&mut self, delta: Delta) {
        self.target_delta = Some(delta);
        self.is_projection_dirty = true;
    }

    /// Drop the snapshot and the node it resumes from.
    pub fn clear_snapshot(&mut self) {
        self.resume_from = None;
        self.snapshot = None;
    }

    pub fn clean_dirty(&mut self) {
        self.is_projection_dirty = false;
        self.is_shared_projection_dirty = false;
        self.is_transform_dirty = false;
    }
}

impl fmt::Debug for ProjectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionNode")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("options", &self.options)
            .field("layout", &self.layout)
            .field("projection_delta", &self.projection_delta)
            .field("tree_scale", &self.tree_scale)
            .finish_non_exhaustive()
    }
}

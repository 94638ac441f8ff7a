//! The projection tree: an arena of nodes mirroring the host tree, the
//! update cycle that snapshots and measures them, and the per-frame pass
//! that turns measured layouts into projection deltas.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::{HashMap, HashSet};
use kinema_animation_core::{
    animate, AnimateOptions, AnimationCallbacks, AnimationHandle, AnimationPlaybackControls, AnimationType, Engine,
    Frameloop, Phase, Process, Transition, Value,
};
use kinema_api_core::{Delta, LayoutBox, Point, ValueMap};
use log::{debug, trace};

use crate::config::ProjectionConfig;
use crate::error::{ProjectionError, Result};
use crate::geometry::{
    aspect_ratio, box_equals_rounded, calc_box_delta, calc_relative_box, calc_relative_position, delta_equals,
    is_near, mix_box, mix_delta, remove_box_transforms, round_box, transform_box, TreeStep,
};
use crate::mix::mix_values;
use crate::node::{
    LayoutAnimationType, LayoutMix, Measurements, NodeId, NodeOptions, ProjectionElement, ProjectionNode,
    ScrollPhase, ScrollState,
};
use crate::stack::{NodeStack, Nodes};
use crate::styles::{
    hidden_styles, projected_styles, reset_styles, unprojected_styles, ScaleCorrector, ScaleCorrectors, StyleMap,
    StyleSource,
};
use crate::transform::{has_2d_translate, has_scale, has_transform, number_or, BoxTransform};

/// Progress units of a layout animation: the shared progress value runs
/// from 0 to this.
const ANIMATION_TARGET: f64 = 1000.0;

/// Options for an explicit promotion within a stack.
#[derive(Clone, Debug, Default)]
pub struct PromoteOptions {
    /// Drop the current projection and render reset styles first.
    pub needs_reset: bool,
    /// Transition for the next layout animation only.
    pub transition: Option<Transition>,
    /// Keep the follower's own opacity instead of fading it out.
    pub preserve_follow_opacity: bool,
}

enum Effect {
    Callback(Rc<dyn Fn()>),
    Stop(AnimationHandle),
}

#[derive(Default)]
struct Arena {
    nodes: Nodes,
    stacks: HashMap<String, NodeStack>,
    /// Mounted nodes, parents before children.
    order: Vec<NodeId>,
    root: Option<NodeId>,
    next_id: u64,
    animation_id: u64,
    is_updating: bool,
    update_blocked: bool,
    has_tree_animated: bool,
    wants_projection_update: bool,
    effects: Vec<Effect>,
}

impl Arena {
    fn node(&self, id: NodeId) -> Result<&ProjectionNode> {
        self.nodes.get(&id).ok_or(ProjectionError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut ProjectionNode> {
        self.nodes.get_mut(&id).ok_or(ProjectionError::UnknownNode(id))
    }

    fn callback(&mut self, cb: Option<Rc<dyn Fn()>>) {
        if let Some(cb) = cb {
            self.effects.push(Effect::Callback(cb));
        }
    }

    fn rebuild_order(&mut self) {
        let mut order: Vec<(usize, NodeId)> = self
            .nodes
            .values()
            .filter(|n| n.is_mounted())
            .map(|n| (n.depth, n.id))
            .collect();
        order.sort_unstable();
        self.order = order.into_iter().map(|(_, id)| id).collect();
    }

    /// Ancestors of `id`, root first.
    fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(p) = current {
            path.push(p);
            current = self.nodes.get(&p).and_then(|n| n.parent);
        }
        path.reverse();
        path
    }

    fn stack_of(&self, id: NodeId) -> Option<&NodeStack> {
        let layout_id = self.nodes.get(&id)?.options.layout_id.as_ref()?;
        self.stacks.get(layout_id)
    }

    fn lead_of(&self, id: NodeId) -> NodeId {
        self.stack_of(id).and_then(NodeStack::lead).unwrap_or(id)
    }

    fn is_lead(&self, id: NodeId) -> bool {
        self.stack_of(id).map_or(true, |s| s.lead() == Some(id))
    }

    fn schedule_render(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.schedule_render();
        }
    }

    fn set_target_delta(&mut self, id: NodeId, delta: Delta) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_target_delta(delta);
            self.wants_projection_update = true;
        }
    }

    /// Drop detached nodes nothing can resume from any more.
    fn collect_detached(&mut self) {
        let mut referenced: HashSet<NodeId> = self.stacks.values().filter_map(NodeStack::lead).collect();
        for node in self.nodes.values() {
            referenced.extend(node.resume_from);
            referenced.extend(node.resuming_from);
        }
        let stale: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.detached && !referenced.contains(&n.id))
            .map(|n| n.id)
            .collect();
        for id in stale {
            if let Some(node) = self.nodes.remove(&id) {
                trace!("dropping detached node {id:?}");
                if let Some(layout_id) = node.options.layout_id {
                    if let Some(stack) = self.stacks.get_mut(&layout_id) {
                        stack.forget(id);
                        if stack.is_empty() {
                            self.stacks.remove(&layout_id);
                        }
                    }
                }
            }
        }
    }

    // Measurement

    fn update_scroll(&mut self, id: NodeId, phase: ScrollPhase) {
        let animation_id = self.animation_id;
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let Some(element) = node.element.clone().filter(|_| node.options.layout_scroll) else {
            return;
        };
        if node
            .scroll
            .is_some_and(|s| s.animation_id == animation_id && s.phase == phase)
        {
            return;
        }
        let is_root = element.is_scroll_root();
        node.scroll = Some(ScrollState {
            animation_id,
            phase,
            is_root,
            offset: element.measure_scroll(),
            was_root: node.scroll.map_or(is_root, |s| s.is_root),
        });
    }

    fn was_scroll_root(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .and_then(|n| n.scroll)
            .is_some_and(|s| s.was_root)
    }

    /// Viewport box plus the root scroll offset, unless inside a node that
    /// was the scroll root.
    fn measure_page_box(&self, id: NodeId) -> LayoutBox {
        let Some(element) = self.nodes.get(&id).and_then(|n| n.element.clone()) else {
            return LayoutBox::default();
        };
        let mut measured = element.measure_viewport_box();
        let in_scroll_root = self.was_scroll_root(id) || self.path(id).into_iter().any(|p| self.was_scroll_root(p));
        if !in_scroll_root {
            if let Some(scroll) = self.root.and_then(|r| self.nodes.get(&r)).and_then(|r| r.scroll) {
                measured.x.translate(scroll.offset.x);
                measured.y.translate(scroll.offset.y);
            }
        }
        measured
    }

    fn remove_element_scroll(&self, id: NodeId, measured: &LayoutBox) -> LayoutBox {
        let mut without = *measured;
        if self.was_scroll_root(id) {
            return without;
        }
        for p in self.path(id) {
            if Some(p) == self.root {
                continue;
            }
            let Some(node) = self.nodes.get(&p) else { continue };
            let Some(scroll) = node.scroll.filter(|_| node.options.layout_scroll) else {
                continue;
            };
            if scroll.was_root {
                without = *measured;
            }
            without.x.translate(scroll.offset.x);
            without.y.translate(scroll.offset.y);
        }
        without
    }

    fn remove_transform(&mut self, id: NodeId, measured: &LayoutBox) -> LayoutBox {
        let mut without = *measured;
        for p in self.path(id) {
            let (mounted, latest) = match self.nodes.get(&p) {
                Some(n) => (n.is_mounted(), n.latest_values.clone()),
                None => continue,
            };
            if !mounted || !has_transform(&latest) {
                continue;
            }
            if has_scale(&latest) {
                self.update_snapshot(p);
            }
            let source = self.measure_page_box(p);
            let origin = self.nodes.get(&p).and_then(|n| n.snapshot.as_ref()).map(|s| s.layout_box);
            remove_box_transforms(&mut without, &latest, origin.as_ref(), Some(&source));
        }
        if let Some(node) = self.nodes.get(&id) {
            if has_transform(&node.latest_values) {
                remove_box_transforms(&mut without, &node.latest_values, None, None);
            }
        }
        without
    }

    /// `layout` with the transforms of every ancestor and of `id` applied.
    fn apply_transform(&self, id: NodeId, layout: &LayoutBox, transform_only: bool) -> LayoutBox {
        let mut with = *layout;
        for p in self.path(id) {
            let Some(node) = self.nodes.get(&p) else { continue };
            if !transform_only && node.options.layout_scroll && Some(p) != self.root {
                if let Some(scroll) = node.scroll {
                    transform_box(&mut with, &BoxTransform::translation(-scroll.offset.x, -scroll.offset.y));
                }
            }
            if has_transform(&node.latest_values) {
                transform_box(&mut with, &BoxTransform::from_values(&node.latest_values));
            }
        }
        if let Some(node) = self.nodes.get(&id) {
            if has_transform(&node.latest_values) {
                transform_box(&mut with, &BoxTransform::from_values(&node.latest_values));
            }
        }
        with
    }

    fn measure(&mut self, id: NodeId, remove_transform: bool) -> Measurements {
        let page = self.measure_page_box(id);
        let mut layout_box = self.remove_element_scroll(id, &page);
        if remove_transform {
            layout_box = self.remove_transform(id, &layout_box);
        }
        round_box(&mut layout_box);
        Measurements {
            animation_id: self.animation_id,
            measured_box: page,
            layout_box,
            latest_values: ValueMap::new(),
            source: id,
        }
    }

    /// Snapshot the box before a change. Collapsed boxes give nothing to
    /// animate from and are discarded.
    fn update_snapshot(&mut self, id: NodeId) {
        if !self.nodes.get(&id).is_some_and(ProjectionNode::is_mounted) {
            return;
        }
        let snapshot = self.measure(id, true);
        let collapsed = snapshot.measured_box.is_collapsed();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.snapshot = if collapsed { None } else { Some(snapshot) };
        }
    }

    // Update cycle

    fn start_update(&mut self) {
        if self.update_blocked {
            return;
        }
        self.is_updating = true;
        self.animation_id += 1;
    }

    fn will_update(&mut self, id: NodeId) {
        if self.update_blocked {
            let cb = self.nodes.get(&id).and_then(|n| n.options.on_exit_complete.clone());
            self.callback(cb);
            return;
        }
        if !self.is_updating {
            self.start_update();
        }
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if node.is_layout_dirty {
            return;
        }
        node.is_layout_dirty = true;
        let animates = node.options.animates_layout();
        for p in self.path(id) {
            let layout_root = match self.nodes.get_mut(&p) {
                Some(n) => {
                    n.should_reset_transform = true;
                    n.options.layout_root
                }
                None => continue,
            };
            self.update_scroll(p, ScrollPhase::Snapshot);
            if layout_root {
                self.will_update(p);
            }
        }
        if animates {
            self.update_snapshot(id);
        }
    }

    fn reset_transform(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let Some(element) = node.element.clone() else { return };
        let requested = node.is_layout_dirty || node.should_reset_transform || node.options.always_measure_layout;
        let has_projection = node.projection_delta.is_some_and(|d| !d.is_identity());
        if requested && (has_projection || has_transform(&node.latest_values)) {
            element.reset_transform();
            node.should_reset_transform = false;
            node.schedule_render();
        }
    }

    fn update_layout(&mut self, id: NodeId) {
        if !self.nodes.get(&id).is_some_and(ProjectionNode::is_mounted) {
            return;
        }
        self.update_scroll(id, ScrollPhase::Measure);
        let is_lead = self.is_lead(id);
        let Some(node) = self.nodes.get(&id) else { return };
        if !(node.options.always_measure_layout && is_lead) && !node.is_layout_dirty {
            return;
        }
        if let Some(resume_from) = node.resume_from {
            if !self.nodes.get(&resume_from).is_some_and(ProjectionNode::is_mounted) {
                for p in self.path(id) {
                    self.update_scroll(p, ScrollPhase::Measure);
                }
            }
        }
        let layout = self.measure(id, false);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.layout = Some(layout);
            node.layout_corrected = LayoutBox::default();
            node.is_layout_dirty = false;
            node.projection_delta = None;
        }
    }

    /// Decide whether the layout change of `id` animates.
    fn notify_layout_update(&mut self, id: NodeId, config: &ProjectionConfig, ctx: &AnimationContext) {
        let is_lead = self.is_lead(id);
        let Some(node) = self.nodes.get(&id) else { return };
        let snapshot = node
            .resume_from
            .and_then(|r| self.nodes.get(&r))
            .and_then(|r| r.snapshot.clone())
            .or_else(|| node.snapshot.clone());

        match (node.layout.clone(), snapshot) {
            (Some(layout), Some(mut snapshot))
                if is_lead && node.is_mounted() && node.options.animates_layout() =>
            {
                let new_layout = layout.layout_box;
                let is_shared = snapshot.source != layout.source;
                let animation_type = node.options.animation_type;
                let has_current_animation = node.current_animation.is_some();
                let position_only = animation_type == LayoutAnimationType::Position
                    || (animation_type == LayoutAnimationType::PreserveAspect
                        && !is_near(aspect_ratio(&snapshot.layout_box), aspect_ratio(&new_layout), 0.2));

                if animation_type == LayoutAnimationType::Size {
                    let axes = if is_shared {
                        &mut snapshot.measured_box
                    } else {
                        &mut snapshot.layout_box
                    };
                    for (axis, target) in [(&mut axes.x, &new_layout.x), (&mut axes.y, &new_layout.y)] {
                        let length = axis.length();
                        axis.min = target.min;
                        axis.max = axis.min + length;
                    }
                } else if position_only {
                    let axes = if is_shared {
                        &mut snapshot.measured_box
                    } else {
                        &mut snapshot.layout_box
                    };
                    axes.x.max = axes.x.min + new_layout.x.length();
                    axes.y.max = axes.y.min + new_layout.y.length();
                    if let Some(node) = self.nodes.get_mut(&id) {
                        if !has_current_animation {
                            if let Some(relative) = node.relative_target.as_mut() {
                                relative.x.max = relative.x.min + new_layout.x.length();
                                relative.y.max = relative.y.min + new_layout.y.length();
                                node.is_projection_dirty = true;
                            }
                        }
                    }
                }

                let mut layout_delta = Delta::default();
                calc_box_delta(&mut layout_delta, &new_layout, &snapshot.layout_box, (0.5, 0.5));
                let mut visual_delta = Delta::default();
                if is_shared {
                    let transformed = self.apply_transform(id, &layout.measured_box, true);
                    calc_box_delta(&mut visual_delta, &transformed, &snapshot.measured_box, (0.5, 0.5));
                } else {
                    calc_box_delta(&mut visual_delta, &new_layout, &snapshot.layout_box, (0.5, 0.5));
                }
                let has_layout_changed = !layout_delta.is_identity();
                let has_relative_layout_changed = self.relative_layout_changed(id, &snapshot.layout_box, &new_layout);
                self.layout_did_update(
                    id,
                    visual_delta,
                    has_layout_changed,
                    has_relative_layout_changed,
                    new_layout,
                    config,
                    ctx,
                );
            }
            _ if is_lead => {
                let cb = node.options.on_exit_complete.clone();
                self.callback(cb);
            }
            _ => {}
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.transition_override = None;
        }
    }

    /// Whether `id` moved relative to its closest projecting ancestor. A
    /// layout root ancestor also becomes the relative parent here.
    fn relative_layout_changed(&mut self, id: NodeId, snapshot: &LayoutBox, layout: &LayoutBox) -> bool {
        if self.nodes.get(&id).is_some_and(|n| n.resume_from.is_some()) {
            return false;
        }
        let Some(parent_id) = self.closest_projecting_parent(id) else {
            return false;
        };
        let Some(parent) = self.nodes.get(&parent_id) else { return false };
        if parent.resume_from.is_some() {
            return false;
        }
        let (Some(parent_snapshot), Some(parent_layout)) = (&parent.snapshot, &parent.layout) else {
            return false;
        };
        let mut relative_snapshot = LayoutBox::default();
        calc_relative_position(&mut relative_snapshot, snapshot, &parent_snapshot.layout_box);
        let mut relative_layout = LayoutBox::default();
        calc_relative_position(&mut relative_layout, layout, &parent_layout.layout_box);
        let changed = !box_equals_rounded(&relative_snapshot, &relative_layout);
        if parent.options.layout_root {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.relative_target = Some(relative_layout);
                node.relative_target_origin = Some(relative_snapshot);
                node.relative_parent = Some(parent_id);
            }
        }
        changed
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_did_update(
        &mut self,
        id: NodeId,
        delta: Delta,
        has_layout_changed: bool,
        has_relative_layout_changed: bool,
        new_layout: LayoutBox,
        config: &ProjectionConfig,
        ctx: &AnimationContext,
    ) {
        let is_lead = self.is_lead(id);
        let Some(node) = self.nodes.get(&id) else { return };
        let has_target_changed = has_relative_layout_changed
            || node
                .target_layout
                .map_or(true, |t| !box_equals_rounded(&t, &new_layout));
        let only_relative_changed = !has_layout_changed && has_relative_layout_changed;
        let layout_root = node.options.layout_root;
        let resume_from = node.resume_from;

        if layout_root
            || resume_from.is_some()
            || only_relative_changed
            || (has_layout_changed && (has_target_changed || node.current_animation.is_none()))
        {
            let mut transition = node
                .transition_override
                .clone()
                .or_else(|| node.options.transition.clone())
                .unwrap_or_else(|| config.layout_transition.clone())
                .for_value("layout");
            if let Some(resume_from) = resume_from {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.resuming_from = Some(resume_from);
                }
                if let Some(prev) = self.nodes.get_mut(&resume_from) {
                    prev.resuming_from = None;
                }
            }
            self.set_animation_origin(id, delta, only_relative_changed, config);
            if ctx.reduce_motion || layout_root {
                transition.delay = Some(0.0);
                transition.kind = Some(AnimationType::Instant);
            }
            self.start_animation(id, transition, ctx);
        } else {
            if !has_layout_changed {
                self.finish_animation(id);
            }
            if is_lead {
                let cb = self.nodes.get(&id).and_then(|n| n.options.on_exit_complete.clone());
                self.callback(cb);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.target_layout = Some(new_layout);
        }
    }

    fn clear_all_snapshots(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_snapshot();
        }
        for stack in self.stacks.values() {
            stack.remove_lead_snapshot(&mut self.nodes);
        }
    }

    /// Root update after the host committed. Returns whether the frame
    /// phases should be flushed.
    fn update(&mut self, config: &ProjectionConfig, ctx: &AnimationContext) -> bool {
        if self.update_blocked {
            self.update_blocked = false;
            self.clear_all_snapshots();
            for node in self.nodes.values_mut() {
                node.is_layout_dirty = false;
            }
            return false;
        }
        if !self.is_updating {
            for node in self.nodes.values_mut() {
                node.is_layout_dirty = false;
            }
        }
        self.is_updating = false;
        let order = self.order.clone();
        for &id in &order {
            self.reset_transform(id);
        }
        for &id in &order {
            self.update_layout(id);
        }
        for &id in &order {
            self.notify_layout_update(id, config, ctx);
        }
        self.clear_all_snapshots();
        self.collect_detached();
        debug!("layout update measured {} nodes", order.len());
        true
    }

    // Layout animation

    fn closest_projecting_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent_id = self.nodes.get(&id)?.parent?;
        let parent = self.nodes.get(&parent_id)?;
        if has_scale(&parent.latest_values) || has_2d_translate(&parent.latest_values) {
            return None;
        }
        if parent.is_projecting() {
            Some(parent_id)
        } else {
            self.closest_projecting_parent(parent_id)
        }
    }

    fn has_opacity_crossfade(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .and_then(|n| n.animation_values.as_ref())
            .is_some_and(|v| v.contains_key("opacityExit"))
    }

    fn set_animation_origin(&mut self, id: NodeId, delta: Delta, only_relative_changed: bool, config: &ProjectionConfig) {
        let is_only_member = self.stack_of(id).map_or(true, |s| s.members().len() <= 1);
        let path_crossfades = self.path(id).into_iter().any(|p| self.has_opacity_crossfade(p));
        let relative_parent_is_root = {
            let Some(node) = self.nodes.get(&id) else { return };
            node.relative_parent
                .and_then(|p| self.nodes.get(&p))
                .is_some_and(|p| p.options.layout_root)
        };
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let snapshot_latest_values = node
            .snapshot
            .as_ref()
            .map(|s| s.latest_values.clone())
            .unwrap_or_default();
        if !relative_parent_is_root {
            node.relative_target = None;
            node.relative_target_origin = None;
        }
        node.attempt_to_resolve_relative_target = !only_relative_changed;
        let is_shared = node.snapshot.as_ref().map(|s| s.source) != node.layout.as_ref().map(|l| l.source);
        let crossfade = node.options.crossfade.unwrap_or(config.crossfade);
        node.animation_progress = 0.0;
        node.mix = Some(LayoutMix {
            delta,
            target_delta: Delta::default(),
            snapshot_latest_values,
            mixed_values: node.latest_values.clone(),
            is_shared,
            crossfade_opacity: is_shared && !is_only_member && crossfade && !path_crossfades,
            is_only_member,
            prev_relative_target: None,
        });
        let start = if node.options.layout_root { ANIMATION_TARGET } else { 0.0 };
        self.mix_target_delta(id, start);
    }

    /// Interpolate the animation started by [`Self::set_animation_origin`]
    /// to `latest`, on the 0..=1000 progress scale.
    fn mix_target_delta(&mut self, id: NodeId, latest: f64) {
        let progress = latest / ANIMATION_TARGET;
        let relative_parent_layout = self
            .nodes
            .get(&id)
            .and_then(|n| n.relative_parent)
            .and_then(|p| self.nodes.get(&p))
            .and_then(|p| p.layout.as_ref())
            .map(|l| l.layout_box);
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let Some(mut mix) = node.mix.take() else { return };

        let mut target_delta = mix.target_delta;
        mix_delta(&mut target_delta, &mix.delta, progress);
        mix.target_delta = target_delta;
        node.set_target_delta(target_delta);

        if let (Some(relative_target), Some(origin), Some(layout), Some(parent_layout)) = (
            node.relative_target.as_mut(),
            node.relative_target_origin,
            node.layout.as_ref(),
            relative_parent_layout,
        ) {
            let mut relative_layout = LayoutBox::default();
            calc_relative_position(&mut relative_layout, &layout.layout_box, &parent_layout);
            mix_box(relative_target, &origin, &relative_layout, progress);
            if mix.prev_relative_target == Some(*relative_target) {
                node.is_projection_dirty = false;
            }
            mix.prev_relative_target = Some(*relative_target);
        }

        if mix.is_shared {
            mix_values(
                &mut mix.mixed_values,
                &mix.snapshot_latest_values,
                &node.latest_values,
                progress,
                mix.crossfade_opacity,
                mix.is_only_member,
            );
            node.animation_values = Some(mix.mixed_values.clone());
        }
        node.animation_progress = progress;
        node.schedule_render();
        node.mix = Some(mix);
        let follower = node.resuming_from;
        self.wants_projection_update = true;

        if progress >= 0.5 {
            if let Some(f) = follower.and_then(|f| self.nodes.get_mut(&f)) {
                if f.hide_at_midpoint {
                    f.hide_at_midpoint = false;
                    f.is_visible = false;
                    f.schedule_render();
                }
            }
        }
    }

    fn start_animation(&mut self, id: NodeId, transition: Transition, ctx: &AnimationContext) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if let Some(current) = node.current_animation.take() {
            self.effects.push(Effect::Stop(current));
        }
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if let Some(pending) = node.pending_animation.take() {
            ctx.engine.frameloop().cancel(&pending);
        }
        let resuming_from = node.resuming_from;
        if let Some(prev) = resuming_from.and_then(|r| self.nodes.get_mut(&r)) {
            if let Some(current) = prev.current_animation.take() {
                self.effects.push(Effect::Stop(current));
            }
        }
        let tree = ctx.tree.clone();
        let pending = ctx.engine.frameloop().update(move |_| {
            if let Some(inner) = tree.upgrade() {
                inner.run_pending_animation(id, transition.clone());
            }
        });
        if let Some(node) = self.nodes.get_mut(&id) {
            node.pending_animation = Some(pending);
        }
        debug!("layout animation scheduled for {id:?}");
    }

    fn complete_animation(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else { return };
        if let Some(prev) = node.resuming_from.and_then(|r| self.nodes.get_mut(&r)) {
            prev.current_animation = None;
            prev.preserve_opacity = false;
            if prev.hide_at_midpoint {
                prev.hide_at_midpoint = false;
                prev.is_visible = false;
                prev.schedule_render();
            }
        }
        let exits = self
            .stack_of(id)
            .map(|s| s.exit_animation_complete(&self.nodes))
            .unwrap_or_default();
        for cb in exits {
            self.callback(Some(cb));
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.resuming_from = None;
            node.current_animation = None;
            node.animation_values = None;
            node.mix = None;
            node.schedule_render();
        }
        self.wants_projection_update = true;
        self.collect_detached();
        debug!("layout animation complete for {id:?}");
    }

    /// Jump a running layout animation to its end.
    fn finish_animation(&mut self, id: NodeId) {
        let current = self.nodes.get_mut(&id).and_then(|n| n.current_animation.take());
        if let Some(current) = current {
            self.mix_target_delta(id, ANIMATION_TARGET);
            self.effects.push(Effect::Stop(current));
        }
        self.complete_animation(id);
    }

    // Projection

    fn propagate_dirty(&mut self, id: NodeId) {
        let Some(parent_id) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return;
        };
        let Some(parent) = self.nodes.get(&parent_id) else { return };
        let (projection, shared, transform) = (
            parent.is_projection_dirty,
            parent.is_shared_projection_dirty,
            parent.is_transform_dirty,
        );
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if !node.is_projecting() {
            node.is_projection_dirty = projection;
        }
        node.is_shared_projection_dirty |= node.is_projection_dirty || projection || shared;
        node.is_transform_dirty |= transform;
    }

    fn force_relative_parent_to_resolve(&mut self, id: NodeId, timestamp: f64) {
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.relative_parent) else {
            return;
        };
        let resolved_now = self
            .nodes
            .get(&parent)
            .is_some_and(|p| p.resolved_relative_target_at == Some(timestamp));
        if !resolved_now {
            self.resolve_target_delta(parent, true, timestamp);
        }
    }

    fn resolve_target_delta(&mut self, id: NodeId, force: bool, timestamp: f64) {
        let lead_id = self.lead_of(id);
        let Some(lead) = self.nodes.get(&lead_id) else { return };
        let (lead_projection, lead_transform, lead_shared) = (
            lead.is_projection_dirty,
            lead.is_transform_dirty,
            lead.is_shared_projection_dirty,
        );
        let parent_dirty = self
            .nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(&p))
            .is_some_and(|p| p.is_projection_dirty);
        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.is_projection_dirty |= lead_projection;
        node.is_transform_dirty |= lead_transform;
        node.is_shared_projection_dirty |= lead_shared;
        let is_shared = node.resuming_from.is_some() || id != lead_id;
        let can_skip = !(force
            || (is_shared && node.is_shared_projection_dirty)
            || node.is_projection_dirty
            || parent_dirty
            || node.attempt_to_resolve_relative_target);
        if can_skip {
            return;
        }
        let Some(layout) = node.layout.as_ref().map(|l| l.layout_box) else {
            return;
        };
        if !node.options.animates_layout() {
            return;
        }
        node.resolved_relative_target_at = Some(timestamp);

        if node.target_delta.is_none() && node.relative_target.is_none() {
            let animation_progress = node.animation_progress;
            let relative_parent = self.closest_projecting_parent(id);
            let parent_layout = relative_parent
                .and_then(|p| self.nodes.get(&p))
                .and_then(|p| p.layout.as_ref())
                .map(|l| l.layout_box);
            match (relative_parent, parent_layout) {
                (Some(parent), Some(parent_layout)) if animation_progress != 1.0 => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_parent = Some(parent);
                    }
                    self.force_relative_parent_to_resolve(id, timestamp);
                    let mut origin = LayoutBox::default();
                    calc_relative_position(&mut origin, &layout, &parent_layout);
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_target_origin = Some(origin);
                        node.relative_target = Some(origin);
                    }
                }
                _ => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_parent = None;
                        node.relative_target = None;
                    }
                }
            }
        }

        let Some(node) = self.nodes.get(&id) else { return };
        if node.relative_target.is_none() && node.target_delta.is_none() {
            return;
        }
        let parent_target = node
            .relative_parent
            .and_then(|p| self.nodes.get(&p))
            .and_then(|p| p.target);
        let target = match (node.relative_target, node.relative_target_origin, parent_target) {
            (Some(relative), Some(_), Some(_)) => {
                self.force_relative_parent_to_resolve(id, timestamp);
                let parent_target = self
                    .nodes
                    .get(&id)
                    .and_then(|n| n.relative_parent)
                    .and_then(|p| self.nodes.get(&p))
                    .and_then(|p| p.target)
                    .unwrap_or_default();
                let mut target = LayoutBox::default();
                calc_relative_box(&mut target, &relative, &parent_target);
                target
            }
            _ => match node.target_delta {
                Some(target_delta) => {
                    let mut target = if node.resuming_from.is_some() {
                        self.apply_transform(id, &layout, false)
                    } else {
                        layout
                    };
                    crate::geometry::apply_box_delta(&mut target, &target_delta);
                    target
                }
                None => layout,
            },
        };
        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.target = Some(target);

        if node.attempt_to_resolve_relative_target {
            node.attempt_to_resolve_relative_target = false;
            let resuming = node.resuming_from.is_some();
            let animation_progress = node.animation_progress;
            let relative_parent = self.closest_projecting_parent(id).filter(|p| {
                self.nodes.get(p).is_some_and(|p| {
                    p.resuming_from.is_some() == resuming && !p.options.layout_scroll && p.target.is_some()
                })
            });
            match relative_parent {
                Some(parent) if animation_progress != 1.0 => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_parent = Some(parent);
                    }
                    self.force_relative_parent_to_resolve(id, timestamp);
                    let parent_target = self.nodes.get(&parent).and_then(|p| p.target).unwrap_or_default();
                    let mut origin = LayoutBox::default();
                    calc_relative_position(&mut origin, &target, &parent_target);
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_target_origin = Some(origin);
                        node.relative_target = Some(origin);
                    }
                }
                _ => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.relative_parent = None;
                        node.relative_target = None;
                    }
                }
            }
        }
    }

    fn calc_projection(&mut self, id: NodeId, timestamp: f64) {
        let lead_id = self.lead_of(id);
        let root = self.root;
        let path = self.path(id);
        let Some(node) = self.nodes.get(&id) else { return };
        let parent = node.parent.and_then(|p| self.nodes.get(&p));
        let is_shared = node.resuming_from.is_some() || id != lead_id;
        let can_skip = !(node.is_projection_dirty
            || parent.is_some_and(|p| p.is_projection_dirty)
            || (is_shared && (node.is_shared_projection_dirty || node.is_transform_dirty))
            || node.resolved_relative_target_at == Some(timestamp));
        if can_skip {
            return;
        }
        let is_tree_animating = parent.is_some_and(|p| p.is_tree_animating)
            || node.current_animation.is_some()
            || node.pending_animation.is_some();

        let steps: Vec<TreeStep> = path
            .iter()
            .filter_map(|p| self.nodes.get(p))
            .map(|p| TreeStep {
                delta: p.projection_delta,
                scroll: p
                    .scroll
                    .filter(|_| is_shared && p.options.layout_scroll && Some(p.id) != root)
                    .map(|s| s.offset),
                transform: (is_shared && has_transform(&p.latest_values))
                    .then(|| BoxTransform::from_values(&p.latest_values)),
            })
            .collect();

        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.is_tree_animating = is_tree_animating;
        if !is_tree_animating {
            node.target_delta = None;
            node.relative_target = None;
        }
        let Some(layout) = node.layout.as_ref().map(|l| l.layout_box) else {
            return;
        };
        if !node.options.animates_layout() {
            return;
        }
        node.layout_corrected = layout;
        let prev_tree_scale = node.tree_scale;
        let mut layout_corrected = node.layout_corrected;
        let mut tree_scale = node.tree_scale;
        crate::geometry::apply_tree_deltas(&mut layout_corrected, &mut tree_scale, &steps);
        node.layout_corrected = layout_corrected;
        node.tree_scale = tree_scale;

        if tree_scale.x != 1.0 || tree_scale.y != 1.0 {
            if let Some(lead) = self.nodes.get_mut(&lead_id) {
                if lead.target.is_none() {
                    lead.target = lead.layout.as_ref().map(|l| l.layout_box);
                }
            }
        }
        let Some(target) = self.nodes.get(&lead_id).and_then(|l| l.target) else {
            if let Some(node) = self.nodes.get_mut(&id) {
                if node.prev_projection_delta.is_some() {
                    node.projection_delta = Some(Delta::default());
                    node.prev_projection_delta = Some(Delta::default());
                    node.schedule_render();
                }
            }
            return;
        };
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let prev = match (node.projection_delta, node.prev_projection_delta) {
            (Some(current), Some(_)) => current,
            _ => Delta::default(),
        };
        let origin = (
            number_or(node.latest_values.get("originX"), 0.5),
            number_or(node.latest_values.get("originY"), 0.5),
        );
        let mut projection = Delta::default();
        calc_box_delta(&mut projection, &node.layout_corrected, &target, origin);
        node.prev_projection_delta = Some(prev);
        node.projection_delta = Some(projection);
        if node.tree_scale != prev_tree_scale || !delta_equals(&projection, &prev) {
            node.has_projected = true;
            node.schedule_render();
            trace!("projection of {id:?} changed: {projection:?}");
        }
    }

    fn update_projection(&mut self, timestamp: f64) {
        let order = self.order.clone();
        for &id in &order {
            self.propagate_dirty(id);
        }
        for &id in &order {
            self.resolve_target_delta(id, false, timestamp);
        }
        for &id in &order {
            self.calc_projection(id, timestamp);
        }
        for &id in &order {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.clean_dirty();
            }
        }
    }

    fn projection_styles(&mut self, id: NodeId, correctors: &ScaleCorrectors) -> Option<StyleMap> {
        let lead_id = self.lead_of(id);
        let lead_target = self.nodes.get(&lead_id).and_then(|l| l.target);
        let node = self.nodes.get_mut(&id)?;
        node.element.as_ref()?;
        if !node.is_visible {
            return Some(hidden_styles());
        }
        if node.needs_reset {
            node.needs_reset = false;
            return Some(reset_styles(node.options.pointer_events.as_deref()));
        }
        let projecting = node.projection_delta.is_some() && node.layout.is_some() && lead_target.is_some();
        if !projecting {
            let mut has_projected = node.has_projected;
            let styles = unprojected_styles(
                &node.latest_values,
                node.options.layout_id.is_some(),
                node.options.pointer_events.as_deref(),
                &mut has_projected,
            );
            node.has_projected = has_projected;
            return Some(styles);
        }
        let node = self.nodes.get(&id)?;
        let lead = self.nodes.get(&lead_id)?;
        let source = StyleSource {
            is_lead: lead_id == id,
            has_layout_id: node.options.layout_id.is_some(),
            projection_delta: node.projection_delta.as_ref()?,
            tree_scale: node.tree_scale,
            lead_values: lead.animation_values.as_ref().unwrap_or(&lead.latest_values),
            lead_animating: lead.animation_values.is_some(),
            latest_values: &node.latest_values,
            preserve_opacity: node.preserve_opacity,
            pointer_events: node.options.pointer_events.as_deref(),
            lead_target,
        };
        Some(projected_styles(&source, correctors))
    }

    fn reset_node(&mut self, id: NodeId, frameloop: &Frameloop) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if let Some(pending) = node.pending_animation.take() {
            frameloop.cancel(&pending);
        }
        if let Some(current) = node.current_animation.take() {
            self.effects.push(Effect::Stop(current));
        }
        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.clear_snapshot();
        node.target = None;
        node.target_delta = None;
        node.relative_target = None;
        node.relative_target_origin = None;
        node.relative_parent = None;
        node.projection_delta = None;
        node.prev_projection_delta = None;
        node.animation_values = None;
        node.resuming_from = None;
        node.mix = None;
        node.animation_progress = 0.0;
        node.tree_scale = Point { x: 1.0, y: 1.0 };
        node.needs_reset = true;
        node.schedule_render();
    }
}

/// What tree operations need to start layout animations.
struct AnimationContext {
    engine: Engine,
    tree: Weak<TreeInner>,
    reduce_motion: bool,
}

struct TreeInner {
    engine: Engine,
    config: ProjectionConfig,
    arena: RefCell<Arena>,
    correctors: RefCell<ScaleCorrectors>,
    update_projection: Process,
    render: Process,
    me: Weak<TreeInner>,
}

impl TreeInner {
    fn context(&self) -> AnimationContext {
        AnimationContext {
            engine: self.engine.clone(),
            tree: self.me.clone(),
            reduce_motion: self.engine.should_reduce_motion(),
        }
    }

    /// Run queued side effects and schedule the frame work the last
    /// operation asked for. Never called with the arena borrowed.
    fn run_effects(&self) {
        let (effects, wants_update, wants_render) = {
            let mut arena = self.arena.borrow_mut();
            let effects = std::mem::take(&mut arena.effects);
            let wants_update = std::mem::take(&mut arena.wants_projection_update);
            let wants_render = arena.nodes.values().any(|n| n.needs_render && n.is_mounted());
            (effects, wants_update, wants_render)
        };
        for effect in effects {
            match effect {
                Effect::Callback(cb) => cb(),
                Effect::Stop(handle) => handle.stop(),
            }
        }
        let frameloop = self.engine.frameloop();
        if wants_update {
            frameloop.schedule_process(&self.update_projection, false, true);
        }
        if wants_render {
            frameloop.schedule_process(&self.render, false, false);
        }
    }

    fn run_update_projection(&self) {
        let timestamp = self.engine.frameloop().state().timestamp;
        self.arena.borrow_mut().update_projection(timestamp);
        self.run_effects();
    }

    fn run_render(&self) {
        let commits: Vec<(Rc<dyn ProjectionElement>, StyleMap)> = {
            let mut arena = self.arena.borrow_mut();
            let correctors = self.correctors.borrow();
            let order = arena.order.clone();
            order
                .into_iter()
                .filter_map(|id| {
                    let node = arena.nodes.get_mut(&id)?;
                    if !std::mem::take(&mut node.needs_render) {
                        return None;
                    }
                    let element = node.element.clone()?;
                    let styles = arena.projection_styles(id, &correctors)?;
                    Some((element, styles))
                })
                .collect()
        };
        for (element, styles) in commits {
            element.render(&styles);
        }
    }

    fn run_pending_animation(&self, id: NodeId, mut transition: Transition) {
        let progress = {
            let mut arena = self.arena.borrow_mut();
            arena.has_tree_animated = true;
            let Some(node) = arena.nodes.get_mut(&id) else { return };
            node.pending_animation = None;
            node.progress
                .get_or_insert_with(|| self.engine.motion_value(0.0))
                .clone()
        };
        let (on_start, on_complete) = {
            let arena = self.arena.borrow();
            match arena.nodes.get(&id) {
                Some(n) => (
                    n.options.on_layout_animation_start.clone(),
                    n.options.on_layout_animation_complete.clone(),
                ),
                None => return,
            }
        };
        transition.velocity = Some(0.0);
        let on_update: Rc<dyn Fn(&Value)> = {
            let tree = self.me.clone();
            Rc::new(move |latest: &Value| {
                if let Some(inner) = tree.upgrade() {
                    inner.arena.borrow_mut().mix_target_delta(id, latest.as_number().unwrap_or(0.0));
                    inner.run_effects();
                }
            })
        };
        let complete: Rc<dyn Fn()> = {
            let tree = self.me.clone();
            Rc::new(move || {
                if let Some(cb) = &on_complete {
                    cb();
                }
                if let Some(inner) = tree.upgrade() {
                    inner.arena.borrow_mut().complete_animation(id);
                    inner.run_effects();
                }
            })
        };
        let handle = animate(
            &self.engine,
            &progress,
            "layout",
            vec![Some(Value::Number(0.0)), Some(Value::Number(ANIMATION_TARGET))],
            AnimateOptions {
                transition,
                element: None,
                callbacks: AnimationCallbacks {
                    on_update: Some(on_update),
                    on_play: on_start,
                    on_complete: Some(complete),
                    on_stop: None,
                },
            },
        );
        let mut arena = self.arena.borrow_mut();
        let Some(node) = arena.nodes.get_mut(&id) else { return };
        if node.mix.is_none() {
            // Completed synchronously.
            return;
        }
        node.current_animation = Some(handle.clone());
        if let Some(prev) = node.resuming_from.and_then(|r| arena.nodes.get_mut(&r)) {
            prev.current_animation = Some(handle);
        }
    }
}

/// Layout projection for one host tree. Cheap to clone; clones share the
/// tree.
#[derive(Clone)]
pub struct ProjectionTree {
    inner: Rc<TreeInner>,
}

impl ProjectionTree {
    pub fn new(engine: &Engine) -> Self {
        Self::with_config(engine, ProjectionConfig::default())
    }

    pub fn with_config(engine: &Engine, config: ProjectionConfig) -> Self {
        let inner = Rc::new_cyclic(|me: &Weak<TreeInner>| {
            let frameloop = engine.frameloop();
            let tree = me.clone();
            let update_projection = frameloop.create_process(Phase::PreRender, move |_| {
                if let Some(inner) = tree.upgrade() {
                    inner.run_update_projection();
                }
            });
            let tree = me.clone();
            let render = frameloop.create_process(Phase::Render, move |_| {
                if let Some(inner) = tree.upgrade() {
                    inner.run_render();
                }
            });
            TreeInner {
                engine: engine.clone(),
                config,
                arena: RefCell::new(Arena::default()),
                correctors: RefCell::new(ScaleCorrectors::default()),
                update_projection,
                render,
                me: me.clone(),
            }
        });
        Self { inner }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.inner.config
    }

    /// Run `f` on the arena, then flush queued effects.
    fn with_arena<T>(&self, f: impl FnOnce(&mut Arena) -> Result<T>) -> Result<T> {
        let result = f(&mut self.inner.arena.borrow_mut());
        self.inner.run_effects();
        result
    }

    /// Create a node with initial `latest` values under `parent`. The first
    /// parentless node becomes the root.
    pub fn new_node(&self, latest: ValueMap, parent: Option<NodeId>) -> Result<NodeId> {
        self.with_arena(|a| {
            let depth = match parent {
                Some(p) => a.node(p)?.depth + 1,
                None => {
                    if let Some(root) = a.root {
                        return Err(ProjectionError::DuplicateRoot(root));
                    }
                    0
                }
            };
            let id = NodeId(a.next_id);
            a.next_id += 1;
            a.nodes.insert(id, ProjectionNode::new(id, parent, depth, latest));
            if parent.is_none() {
                a.root = Some(id);
            }
            Ok(id)
        })
    }

    pub fn root(&self) -> Option<NodeId> {
        self.inner.arena.borrow().root
    }

    pub fn set_options(&self, id: NodeId, options: NodeOptions) -> Result<()> {
        self.with_arena(|a| {
            let node = a.node_mut(id)?;
            let previous = std::mem::replace(&mut node.options, options);
            let mounted = node.is_mounted();
            let layout_id = node.options.layout_id.clone();
            if mounted && previous.layout_id != layout_id {
                if let Some(old) = previous.layout_id.and_then(|l| a.stacks.get_mut(&l)) {
                    old.remove(&mut a.nodes, id);
                }
                if let Some(layout_id) = layout_id {
                    register_shared_node(a, &layout_id, id);
                }
            }
            Ok(())
        })
    }

    pub fn options(&self, id: NodeId) -> Result<NodeOptions> {
        Ok(self.inner.arena.borrow().node(id)?.options.clone())
    }

    /// Replace the values the element renders with.
    pub fn set_latest_values(&self, id: NodeId, latest: ValueMap) -> Result<()> {
        self.with_arena(|a| {
            let node = a.node_mut(id)?;
            node.latest_values = latest;
            node.is_transform_dirty = true;
            node.schedule_render();
            a.wants_projection_update = true;
            Ok(())
        })
    }

    pub fn latest_values(&self, id: NodeId) -> Result<ValueMap> {
        Ok(self.inner.arena.borrow().node(id)?.latest_values.clone())
    }

    /// Attach `element` and join the shared stack of the node's layout id.
    pub fn mount(&self, id: NodeId, element: Rc<dyn ProjectionElement>) -> Result<()> {
        self.with_arena(|a| {
            let has_tree_animated = a.has_tree_animated;
            let node = a.node_mut(id)?;
            node.element = Some(element);
            node.detached = false;
            if has_tree_animated && node.options.animates_layout() {
                node.is_layout_dirty = true;
            }
            let (parent, layout_id) = (node.parent, node.options.layout_id.clone());
            if let Some(parent) = parent.and_then(|p| a.nodes.get_mut(&p)) {
                if !parent.children.contains(&id) {
                    parent.children.push(id);
                }
            }
            a.rebuild_order();
            if let Some(layout_id) = layout_id {
                register_shared_node(a, &layout_id, id);
            }
            Ok(())
        })
    }

    /// Snapshot, then detach from the tree and its stack. The node is kept
    /// while a stack member can still resume from it.
    pub fn unmount(&self, id: NodeId) -> Result<()> {
        let frameloop = self.inner.engine.frameloop();
        self.with_arena(|a| {
            a.node(id)?;
            a.will_update(id);
            let layout_id = a.node(id)?.options.layout_id.clone();
            if let Some(stack) = layout_id.and_then(|l| a.stacks.get_mut(&l)) {
                stack.remove(&mut a.nodes, id);
            }
            let node = a.node_mut(id)?;
            node.element = None;
            node.detached = true;
            if let Some(pending) = node.pending_animation.take() {
                frameloop.cancel(&pending);
            }
            let parent = node.parent;
            if let Some(parent) = parent.and_then(|p| a.nodes.get_mut(&p)) {
                parent.children.retain(|c| *c != id);
            }
            if a.root == Some(id) {
                a.root = None;
            }
            a.rebuild_order();
            a.collect_detached();
            Ok(())
        })
    }

    /// Mark `id` as about to change layout and snapshot it.
    pub fn will_update(&self, id: NodeId) -> Result<()> {
        self.with_arena(|a| {
            if !a.node(id)?.is_mounted() {
                return Err(ProjectionError::NotMounted(id));
            }
            a.will_update(id);
            Ok(())
        })
    }

    /// The host committed: measure, decide layout animations and flush the
    /// update, pre-render and render phases synchronously.
    pub fn did_update(&self) {
        let ctx = self.inner.context();
        let flush = self.inner.arena.borrow_mut().update(&self.inner.config, &ctx);
        self.inner.run_effects();
        if flush {
            self.inner
                .engine
                .frameloop()
                .process_steps(&[Phase::Update, Phase::PreRender, Phase::Render]);
        }
    }

    /// Skip the next update: snapshots are dropped instead of animated.
    pub fn block_update(&self) {
        self.inner.arena.borrow_mut().update_blocked = true;
    }

    pub fn unblock_update(&self) {
        self.inner.arena.borrow_mut().update_blocked = false;
    }

    pub fn is_update_blocked(&self) -> bool {
        self.inner.arena.borrow().update_blocked
    }

    /// Stop every layout animation and clear all projections.
    pub fn reset_tree(&self) {
        {
            let mut arena = self.inner.arena.borrow_mut();
            for id in arena.order.clone() {
                arena.reset_node(id, self.inner.engine.frameloop());
            }
            arena.collect_detached();
        }
        self.inner.run_effects();
    }

    pub fn promote(&self, id: NodeId, options: PromoteOptions) -> Result<()> {
        self.with_arena(|a| {
            let layout_id = a.node(id)?.options.layout_id.clone();
            if let Some(stack) = layout_id.and_then(|l| a.stacks.get_mut(&l)) {
                stack.promote(&mut a.nodes, id, options.preserve_follow_opacity);
            }
            let is_updating = a.is_updating;
            let node = a.node_mut(id)?;
            if is_updating && node.resume_from.is_some() {
                node.is_layout_dirty = true;
            }
            if options.needs_reset {
                node.projection_delta = None;
                node.needs_reset = true;
            }
            if options.transition.is_some() {
                node.transition_override = options.transition;
            }
            Ok(())
        })
    }

    /// Hand the lead back to an earlier present member. Returns whether the
    /// lead changed hands.
    pub fn relegate(&self, id: NodeId) -> Result<bool> {
        self.with_arena(|a| {
            let layout_id = a.node(id)?.options.layout_id.clone();
            Ok(match layout_id.and_then(|l| a.stacks.get_mut(&l)) {
                Some(stack) => stack.relegate(&mut a.nodes, id),
                None => false,
            })
        })
    }

    pub fn hide(&self, id: NodeId) -> Result<()> {
        self.set_visible(id, false)
    }

    pub fn show(&self, id: NodeId) -> Result<()> {
        self.set_visible(id, true)
    }

    fn set_visible(&self, id: NodeId, visible: bool) -> Result<()> {
        self.with_arena(|a| {
            a.node_mut(id)?.is_visible = visible;
            let layout_id = a.node(id)?.options.layout_id.clone();
            match layout_id.and_then(|l| a.stacks.get(&l)) {
                Some(stack) => stack.schedule_render(&mut a.nodes),
                None => a.schedule_render(id),
            }
            Ok(())
        })
    }

    /// Jump the layout animation of `id` to its end.
    pub fn finish_animation(&self, id: NodeId) -> Result<()> {
        self.with_arena(|a| {
            a.node(id)?;
            a.finish_animation(id);
            Ok(())
        })
    }

    /// Run the projection pass now instead of in the next pre-render phase.
    pub fn update_projection(&self) {
        self.inner.run_update_projection();
    }

    /// Styles rendering `id` at its projected position, or `None` while
    /// unmounted.
    pub fn projection_styles(&self, id: NodeId) -> Result<Option<StyleMap>> {
        let correctors = self.inner.correctors.borrow();
        let mut arena = self.inner.arena.borrow_mut();
        arena.node(id)?;
        Ok(arena.projection_styles(id, &correctors))
    }

    pub fn register_scale_corrector(&self, name: &str, corrector: ScaleCorrector) {
        self.inner.correctors.borrow_mut().register(name, corrector);
    }

    pub fn tree_scale(&self, id: NodeId) -> Result<Point> {
        Ok(self.inner.arena.borrow().node(id)?.tree_scale)
    }

    pub fn projection_delta(&self, id: NodeId) -> Result<Option<Delta>> {
        Ok(self.inner.arena.borrow().node(id)?.projection_delta)
    }

    pub fn snapshot(&self, id: NodeId) -> Result<Option<Measurements>> {
        Ok(self.inner.arena.borrow().node(id)?.snapshot.clone())
    }

    pub fn layout(&self, id: NodeId) -> Result<Option<Measurements>> {
        Ok(self.inner.arena.borrow().node(id)?.layout.clone())
    }

    pub fn target(&self, id: NodeId) -> Result<Option<LayoutBox>> {
        Ok(self.inner.arena.borrow().node(id)?.target)
    }

    pub fn animation_values(&self, id: NodeId) -> Result<Option<ValueMap>> {
        Ok(self.inner.arena.borrow().node(id)?.animation_values.clone())
    }

    pub fn animation_progress(&self, id: NodeId) -> Result<f64> {
        Ok(self.inner.arena.borrow().node(id)?.animation_progress)
    }

    pub fn is_animating(&self, id: NodeId) -> Result<bool> {
        let arena = self.inner.arena.borrow();
        let node = arena.node(id)?;
        Ok(node.current_animation.is_some() || node.pending_animation.is_some())
    }

    pub fn is_visible(&self, id: NodeId) -> Result<bool> {
        Ok(self.inner.arena.borrow().node(id)?.is_visible)
    }

    pub fn is_lead(&self, id: NodeId) -> Result<bool> {
        let arena = self.inner.arena.borrow();
        arena.node(id)?;
        Ok(arena.is_lead(id))
    }

    /// The stack lead of `id`'s layout id, or `id` itself.
    pub fn lead(&self, id: NodeId) -> Result<NodeId> {
        let arena = self.inner.arena.borrow();
        arena.node(id)?;
        Ok(arena.lead_of(id))
    }

    pub fn resume_from(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.inner.arena.borrow().node(id)?.resume_from)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.inner.arena.borrow().node(id)?.children.clone())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.arena.borrow().nodes.contains_key(&id)
    }

    pub fn stack_members(&self, layout_id: &str) -> Vec<NodeId> {
        self.inner
            .arena
            .borrow()
            .stacks
            .get(layout_id)
            .map(|s| s.members().to_vec())
            .unwrap_or_default()
    }
}

fn register_shared_node(a: &mut Arena, layout_id: &str, id: NodeId) {
    let stack = a.stacks.entry(layout_id.to_string()).or_default();
    stack.add(&mut a.nodes, id);
    stack.promote(&mut a.nodes, id, false);
    let is_updating = a.is_updating;
    if let Some(node) = a.nodes.get_mut(&id) {
        if is_updating && node.resume_from.is_some() {
            node.is_layout_dirty = true;
        }
    }
}

impl fmt::Debug for ProjectionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.inner.arena.borrow();
        f.debug_struct("ProjectionTree")
            .field("nodes", &arena.nodes.len())
            .field("root", &arena.root)
            .field("is_updating", &arena.is_updating)
            .finish_non_exhaustive()
    }
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kinema_animation_core::{Engine, MotionConfig};
use kinema_api_core::{LayoutBox, ValueMap};
use kinema_projection_core::{
    NodeId, NodeOptions, ProjectionElement, ProjectionError, ProjectionTree, PromoteOptions, StyleMap,
};
use serde::Deserialize;

#[derive(Default)]
struct FakeElement {
    bounds: RefCell<LayoutBox>,
    rendered: RefCell<Vec<StyleMap>>,
}

impl FakeElement {
    fn at(bounds: LayoutBox) -> Rc<Self> {
        Rc::new(Self {
            bounds: RefCell::new(bounds),
            ..Self::default()
        })
    }

    fn move_to(&self, bounds: LayoutBox) {
        *self.bounds.borrow_mut() = bounds;
    }
}

impl ProjectionElement for FakeElement {
    fn measure_viewport_box(&self) -> LayoutBox {
        *self.bounds.borrow()
    }

    fn render(&self, styles: &StyleMap) {
        self.rendered.borrow_mut().push(styles.clone());
    }
}

#[derive(Deserialize)]
struct NestedNode {
    name: String,
    parent: Option<String>,
    snapshot: LayoutBox,
    layout: LayoutBox,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedExpect {
    parent_scale_x: f64,
    child_tree_scale_x: f64,
}

#[derive(Deserialize)]
struct NestedScale {
    nodes: Vec<NestedNode>,
    expect: NestedExpect,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedPromotion {
    layout_id: String,
    first: LayoutBox,
    second: LayoutBox,
}

fn engine() -> Engine {
    Engine::new(MotionConfig::manual())
}

fn approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "left={a} right={b}");
}

struct Mounted {
    id: NodeId,
    element: Rc<FakeElement>,
}

fn mount(tree: &ProjectionTree, parent: Option<NodeId>, options: NodeOptions, bounds: LayoutBox) -> Mounted {
    let id = tree.new_node(ValueMap::new(), parent).unwrap();
    tree.set_options(id, options).unwrap();
    let element = FakeElement::at(bounds);
    tree.mount(id, element.clone()).unwrap();
    Mounted { id, element }
}

/// Mounts the nested-scale fixture and runs one layout update.
fn nested_scale(engine: &Engine) -> (ProjectionTree, NestedScale, Mounted, Mounted) {
    let fixture: NestedScale = kinema_test_fixtures::layouts::load("nested-scale").unwrap();
    let tree = ProjectionTree::new(engine);
    let parent = &fixture.nodes[0];
    let child = &fixture.nodes[1];
    assert_eq!(child.parent.as_deref(), Some(parent.name.as_str()));

    let p = mount(&tree, None, NodeOptions::layout(), parent.snapshot);
    let c = mount(&tree, Some(p.id), NodeOptions::layout(), child.snapshot);
    tree.will_update(p.id).unwrap();
    tree.will_update(c.id).unwrap();
    p.element.move_to(parent.layout);
    c.element.move_to(child.layout);
    tree.did_update();
    (tree, fixture, p, c)
}

#[test]
fn child_counters_inherited_parent_scale() {
    let engine = engine();
    let (tree, fixture, parent, child) = nested_scale(&engine);

    let delta = tree.projection_delta(parent.id).unwrap().expect("parent projects");
    approx(delta.x.scale, fixture.expect.parent_scale_x);
    approx(delta.y.scale, 1.0);
    approx(tree.tree_scale(child.id).unwrap().x, fixture.expect.child_tree_scale_x);
    assert!(tree.is_animating(parent.id).unwrap());
    assert!(!tree.is_animating(child.id).unwrap());

    let parent_styles = parent.element.rendered.borrow().last().cloned().expect("parent rendered");
    assert_ne!(parent_styles["transform"], "none");
    assert_eq!(parent_styles["transformOrigin"], "50% 50% 0");

    engine.frameloop().run_until_idle(200);
    assert!(!tree.is_animating(parent.id).unwrap());
    assert!(tree.projection_delta(parent.id).unwrap().unwrap().is_identity());
    let child_delta = tree.projection_delta(child.id).unwrap().unwrap();
    approx(child_delta.x.scale, 1.0);
}

#[test]
fn layout_animation_reports_start_and_completion() {
    let engine = engine();
    let tree = ProjectionTree::new(&engine);
    let started = Rc::new(Cell::new(0));
    let completed = Rc::new(Cell::new(0));
    let (s, c) = (started.clone(), completed.clone());
    let options = NodeOptions {
        on_layout_animation_start: Some(Rc::new(move || s.set(s.get() + 1))),
        on_layout_animation_complete: Some(Rc::new(move || c.set(c.get() + 1))),
        ..NodeOptions::layout()
    };
    let node = mount(&tree, None, options, LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0));

    tree.will_update(node.id).unwrap();
    node.element.move_to(LayoutBox::from_edges(0.0, 50.0, 150.0, 100.0));
    tree.did_update();
    let delta = tree.projection_delta(node.id).unwrap().unwrap();
    approx(delta.x.translate, -50.0);

    engine.frameloop().run_until_idle(200);
    assert_eq!(started.get(), 1);
    assert_eq!(completed.get(), 1);
    approx(tree.animation_progress(node.id).unwrap(), 1.0);
}

#[test]
fn unchanged_layout_does_not_animate() {
    let engine = engine();
    let tree = ProjectionTree::new(&engine);
    let node = mount(&tree, None, NodeOptions::layout(), LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0));
    tree.will_update(node.id).unwrap();
    tree.did_update();
    assert!(!tree.is_animating(node.id).unwrap());
    assert!(tree.projection_delta(node.id).unwrap().is_none());
}

#[test]
fn promoted_member_resumes_from_previous_lead() {
    let engine = engine();
    let fixture: SharedPromotion = kinema_test_fixtures::layouts::load("shared-promotion").unwrap();
    let tree = ProjectionTree::new(&engine);
    let root = mount(&tree, None, NodeOptions::default(), LayoutBox::from_edges(0.0, 0.0, 1000.0, 1000.0));
    let a = mount(&tree, Some(root.id), NodeOptions::shared(&fixture.layout_id), fixture.first);
    assert!(tree.is_lead(a.id).unwrap());

    tree.will_update(a.id).unwrap();
    tree.unmount(a.id).unwrap();
    let b = mount(&tree, Some(root.id), NodeOptions::shared(&fixture.layout_id), fixture.second);

    assert_eq!(tree.lead(a.id).unwrap(), b.id);
    assert_eq!(tree.resume_from(b.id).unwrap(), Some(a.id));
    let inherited = tree.snapshot(b.id).unwrap().expect("snapshot handed over");
    assert_eq!(inherited.source, a.id);
    assert_eq!(inherited.layout_box, fixture.first);

    tree.did_update();
    let delta = tree.projection_delta(b.id).unwrap().unwrap();
    approx(delta.x.scale, 0.5);
    approx(delta.y.scale, 0.5);
    assert!(tree.contains(a.id));

    engine.frameloop().run_until_idle(200);
    assert!(!tree.contains(a.id));
    assert_eq!(tree.stack_members(&fixture.layout_id), vec![b.id]);
}

#[test]
fn present_members_crossfade() {
    let engine = engine();
    let fixture: SharedPromotion = kinema_test_fixtures::layouts::load("shared-promotion").unwrap();
    let tree = ProjectionTree::new(&engine);
    let root = mount(&tree, None, NodeOptions::default(), LayoutBox::from_edges(0.0, 0.0, 1000.0, 1000.0));
    let a = mount(&tree, Some(root.id), NodeOptions::shared(&fixture.layout_id), fixture.first);

    tree.will_update(a.id).unwrap();
    let b = mount(&tree, Some(root.id), NodeOptions::shared(&fixture.layout_id), fixture.second);
    tree.did_update();

    let lead = tree.projection_styles(b.id).unwrap().unwrap();
    let follower = tree.projection_styles(a.id).unwrap().unwrap();
    assert_eq!(lead["opacity"], "0");
    assert_eq!(follower["opacity"], "1");
    assert_eq!(follower["pointerEvents"], "none");

    engine.frameloop().run_until_idle(200);
    assert!(tree.animation_values(b.id).unwrap().is_none());
    assert!(tree.is_visible(a.id).unwrap());
}

#[test]
fn disabled_crossfade_hides_follower_past_midpoint() {
    let engine = engine();
    let fixture: SharedPromotion = kinema_test_fixtures::layouts::load("shared-promotion").unwrap();
    let tree = ProjectionTree::new(&engine);
    let root = mount(&tree, None, NodeOptions::default(), LayoutBox::from_edges(0.0, 0.0, 1000.0, 1000.0));
    let a = mount(&tree, Some(root.id), NodeOptions::shared(&fixture.layout_id), fixture.first);

    tree.will_update(a.id).unwrap();
    let options = NodeOptions {
        crossfade: Some(false),
        ..NodeOptions::shared(&fixture.layout_id)
    };
    let b = mount(&tree, Some(root.id), options, fixture.second);
    tree.did_update();
    assert!(tree.is_visible(a.id).unwrap());

    engine.frameloop().run_until_idle(200);
    assert!(!tree.is_visible(a.id).unwrap());
    assert_eq!(tree.projection_styles(a.id).unwrap().unwrap()["visibility"], "hidden");
    assert!(tree.is_visible(b.id).unwrap());
}

#[test]
fn relegate_and_explicit_promote() {
    let engine = engine();
    let tree = ProjectionTree::new(&engine);
    let root = mount(&tree, None, NodeOptions::default(), LayoutBox::from_edges(0.0, 0.0, 1000.0, 1000.0));
    let bounds = LayoutBox::from_edges(0.0, 0.0, 10.0, 10.0);
    let a = mount(&tree, Some(root.id), NodeOptions::shared("tab"), bounds);
    let b = mount(&tree, Some(root.id), NodeOptions::shared("tab"), bounds);
    assert_eq!(tree.lead(a.id).unwrap(), b.id);

    let exiting = NodeOptions {
        is_present: false,
        ..NodeOptions::shared("tab")
    };
    tree.set_options(b.id, exiting).unwrap();
    assert!(tree.relegate(b.id).unwrap());
    assert_eq!(tree.lead(b.id).unwrap(), a.id);

    tree.promote(b.id, PromoteOptions::default()).unwrap();
    assert!(tree.is_lead(b.id).unwrap());
    assert_eq!(tree.stack_members("tab"), vec![a.id, b.id]);
}

#[test]
fn blocked_update_skips_animation() {
    let engine = engine();
    let tree = ProjectionTree::new(&engine);
    let exits = Rc::new(Cell::new(0));
    let e = exits.clone();
    let options = NodeOptions {
        on_exit_complete: Some(Rc::new(move || e.set(e.get() + 1))),
        ..NodeOptions::layout()
    };
    let node = mount(&tree, None, options, LayoutBox::from_edges(0.0, 0.0, 100.0, 100.0));

    tree.block_update();
    tree.will_update(node.id).unwrap();
    node.element.move_to(LayoutBox::from_edges(0.0, 0.0, 300.0, 100.0));
    tree.did_update();

    assert_eq!(exits.get(), 1);
    assert!(!tree.is_update_blocked());
    assert!(!tree.is_animating(node.id).unwrap());
    assert!(tree.snapshot(node.id).unwrap().is_none());
}

#[test]
fn finish_animation_jumps_to_layout() {
    let engine = engine();
    let (tree, _, parent, _) = nested_scale(&engine);
    assert!(tree.is_animating(parent.id).unwrap());

    tree.finish_animation(parent.id).unwrap();
    tree.update_projection();
    assert!(!tree.is_animating(parent.id).unwrap());
    assert!(tree.projection_delta(parent.id).unwrap().unwrap().is_identity());
}

#[test]
fn reset_tree_clears_projection() {
    let engine = engine();
    let (tree, _, parent, child) = nested_scale(&engine);

    tree.reset_tree();
    assert!(tree.projection_delta(parent.id).unwrap().is_none());
    assert!(!tree.is_animating(parent.id).unwrap());
    let styles = tree.projection_styles(child.id).unwrap().unwrap();
    assert_eq!(styles["transform"], "none");
    assert_eq!(styles["opacity"], "");
}

#[test]
fn tree_structure_errors() {
    let engine = engine();
    let tree = ProjectionTree::new(&engine);
    let root = tree.new_node(ValueMap::new(), None).unwrap();
    assert!(matches!(
        tree.new_node(ValueMap::new(), None),
        Err(ProjectionError::DuplicateRoot(id)) if id == root
    ));
    assert!(matches!(
        tree.new_node(ValueMap::new(), Some(NodeId(99))),
        Err(ProjectionError::UnknownNode(NodeId(99)))
    ));
    assert!(tree.projection_styles(root).unwrap().is_none());
}

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use kinema_animation_core::{Frameloop, MotionConfig, MotionValue, Phase};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn push(log: &Log, entry: &'static str) -> impl FnMut(&kinema_animation_core::FrameData) + 'static {
    let log = log.clone();
    move |_| log.borrow_mut().push(entry)
}

#[test]
fn phases_run_in_order() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let log: Log = Rc::default();
    fl.render(push(&log, "render"));
    fl.read(push(&log, "read"));
    fl.post_render(push(&log, "post_render"));
    fl.setup(push(&log, "setup"));
    fl.update(push(&log, "update"));
    fl.resolve_keyframes(push(&log, "resolve_keyframes"));
    fl.pre_render(push(&log, "pre_render"));
    fl.pre_update(push(&log, "pre_update"));
    fl.process_batch();
    assert_eq!(
        *log.borrow(),
        vec!["setup", "read", "resolve_keyframes", "pre_update", "update", "pre_render", "render", "post_render"]
    );
}

#[test]
fn earlier_phase_waits_unless_immediate() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let log: Log = Rc::default();
    let (fl2, log2) = (fl.clone(), log.clone());
    fl.update(move |_| {
        fl2.read(push(&log2, "deferred read"));
        fl2.schedule(Phase::Read, push(&log2, "immediate read"), false, true);
        fl2.render(push(&log2, "same frame render"));
    });

    fl.process_batch();
    assert_eq!(*log.borrow(), vec!["same frame render", "immediate read"]);
    assert!(fl.frame_requested());

    fl.process_batch();
    assert_eq!(log.borrow().last(), Some(&"deferred read"));
    assert!(!fl.frame_requested());
}

#[test]
fn duplicate_scheduling_runs_once() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let log: Log = Rc::default();
    let process = fl.create_process(Phase::Update, push(&log, "tick"));
    fl.schedule_process(&process, false, false);
    fl.schedule_process(&process, false, false);
    fl.process_batch();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn keep_alive_until_cancelled() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let log: Log = Rc::default();
    let process = fl.schedule(Phase::Update, push(&log, "tick"), true, false);
    assert_eq!(fl.run_until_idle(3), 3);
    assert_eq!(log.borrow().len(), 3);

    fl.cancel(&process);
    fl.process_batch();
    assert_eq!(log.borrow().len(), 3);
    assert!(fl.is_idle());
}

#[test]
fn manual_timing_advances_fixed_steps() {
    let fl = Frameloop::new(&MotionConfig::manual());
    fl.update(|_| {});
    fl.process_batch();
    let first = fl.state();
    fl.process_batch();
    let second = fl.state();
    assert!((second.timestamp - first.timestamp - 1000.0 / 60.0).abs() < 1e-9);
    assert!(!second.is_processing);
}

#[test]
fn stale_velocity_is_zero() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let value = MotionValue::new(&fl, 0.0);
    fl.process_batch();
    value.set(10.0);
    let velocity = value.get_velocity();
    assert!((velocity - 600.0).abs() < 1e-6, "velocity {velocity}");

    fl.process_batch();
    fl.process_batch();
    assert_eq!(value.get_velocity(), 0.0);
}

#[test]
fn non_numeric_values_have_no_velocity() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let value = MotionValue::new(&fl, kinema_animation_core::Value::keyword("block"));
    fl.process_batch();
    value.set(kinema_animation_core::Value::keyword("none"));
    assert_eq!(value.get_velocity(), 0.0);
}

#[test]
fn panicking_rerun_does_not_defer_later_immediate_work() {
    let fl = Frameloop::new(&MotionConfig::manual());
    let scheduler = fl.clone();
    fl.render(move |_| {
        scheduler.schedule(Phase::Update, |_| panic!("update failed"), false, true);
    });
    let result = panic::catch_unwind(AssertUnwindSafe(|| fl.process_batch()));
    assert!(result.is_err());

    let log: Log = Rc::default();
    let scheduler = fl.clone();
    let late = log.clone();
    fl.render(move |_| {
        late.borrow_mut().push("render");
        scheduler.schedule(Phase::Update, push(&late, "late update"), false, true);
    });
    fl.process_batch();
    assert_eq!(*log.borrow(), vec!["render", "late update"]);
}

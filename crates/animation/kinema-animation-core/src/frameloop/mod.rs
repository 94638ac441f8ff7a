//! Frame batcher: every piece of per-frame work is scheduled into one of eight
//! ordered phases and flushed together once per host frame.
//!
//! `Frameloop` is a cheap handle; clones share one scheduler. Nothing here is
//! global: tests build a fresh loop per case and drive it with
//! [`Frameloop::process_batch`].

mod clock;
mod render_step;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

pub use clock::{Clock, FrameHost, ManualClock, SystemClock};
use render_step::RenderStep;

use crate::config::{MotionConfig, DEFAULT_FRAME_MS};
use crate::ids::{IdAllocator, ProcessId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Setup,
    Read,
    ResolveKeyframes,
    PreUpdate,
    Update,
    PreRender,
    Render,
    PostRender,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Setup,
        Phase::Read,
        Phase::ResolveKeyframes,
        Phase::PreUpdate,
        Phase::Update,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Per-frame timing shared with every process.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    pub timestamp: f64,
    pub delta: f64,
    pub is_processing: bool,
}

type Callback = dyn FnMut(&FrameData);

/// A schedulable callback bound to one phase. Scheduling the same process
/// twice in one frame runs it once.
#[derive(Clone)]
pub struct Process {
    id: ProcessId,
    phase: Phase,
    callback: Rc<RefCell<Callback>>,
}

impl Process {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .finish()
    }
}

struct Inner {
    steps: [RefCell<RenderStep>; 8],
    state: Cell<FrameData>,
    current_phase: Cell<Option<Phase>>,
    run_next_frame: Cell<bool>,
    use_default_elapsed: Cell<bool>,
    frame_pending: Cell<bool>,
    late: RefCell<Vec<Process>>,
    in_rerun: Cell<bool>,
    ids: RefCell<IdAllocator>,
    clock: Rc<dyn Clock>,
    host: RefCell<Option<Rc<dyn FrameHost>>>,
    manual_timing: bool,
    max_elapsed: f64,
}

#[derive(Clone)]
pub struct Frameloop {
    inner: Rc<Inner>,
}

/// Clears step state even when a process panics.
struct StepGuard<'a>(&'a RefCell<RenderStep>);

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut step) = self.0.try_borrow_mut() {
            step.end();
        }
    }
}

/// Clears batch state even when a process panics.
struct BatchGuard<'a>(&'a Inner);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.get();
        state.is_processing = false;
        self.0.state.set(state);
        self.0.current_phase.set(None);
    }
}

/// Leaves rerun mode even when a process panics.
struct RerunGuard<'a>(&'a Inner);

impl Drop for RerunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut late) = self.0.late.try_borrow_mut() {
            late.clear();
        }
        self.0.in_rerun.set(false);
    }
}

impl Frameloop {
    pub fn new(config: &MotionConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock::new()))
    }

    pub fn with_clock(config: &MotionConfig, clock: Rc<dyn Clock>) -> Self {
        let inner = Inner {
            steps: Default::default(),
            state: Cell::new(FrameData::default()),
            current_phase: Cell::new(None),
            run_next_frame: Cell::new(false),
            use_default_elapsed: Cell::new(true),
            frame_pending: Cell::new(false),
            late: RefCell::new(Vec::new()),
            in_rerun: Cell::new(false),
            ids: RefCell::new(IdAllocator::new()),
            clock,
            host: RefCell::new(None),
            manual_timing: config.use_manual_timing,
            max_elapsed: config.max_elapsed_ms,
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn set_host(&self, host: Rc<dyn FrameHost>) {
        *self.inner.host.borrow_mut() = Some(host);
    }

    pub fn state(&self) -> FrameData {
        self.inner.state.get()
    }

    /// Frame timestamp while processing (or in manual timing), else the clock.
    pub fn now(&self) -> f64 {
        let state = self.inner.state.get();
        if state.is_processing || self.inner.manual_timing {
            state.timestamp
        } else {
            self.inner.clock.now()
        }
    }

    /// Whether a frame has been requested and not yet processed.
    pub fn frame_requested(&self) -> bool {
        self.inner.frame_pending.get()
    }

    pub fn same_loop(&self, other: &Frameloop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wrap a callback as a process bound to `phase` without scheduling it.
    pub fn create_process(&self, phase: Phase, callback: impl FnMut(&FrameData) + 'static) -> Process {
        let id = self.inner.ids.borrow_mut().alloc_process();
        Process {
            id,
            phase,
            callback: Rc::new(RefCell::new(callback)),
        }
    }

    pub fn schedule(
        &self,
        phase: Phase,
        callback: impl FnMut(&FrameData) + 'static,
        keep_alive: bool,
        immediate: bool,
    ) -> Process {
        let process = self.create_process(phase, callback);
        self.schedule_process(&process, keep_alive, immediate);
        process
    }

    pub fn schedule_process(&self, process: &Process, keep_alive: bool, immediate: bool) {
        if !self.inner.run_next_frame.get() {
            self.wake();
        }
        let state = self.inner.state.get();
        let finished = match self.inner.current_phase.get() {
            Some(current) => state.is_processing && process.phase < current,
            None => false,
        };
        if immediate && finished && !self.inner.in_rerun.get() {
            if keep_alive {
                self.step(process.phase).borrow_mut().schedule(process.clone(), true, false);
            }
            self.inner.late.borrow_mut().push(process.clone());
            return;
        }
        self.step(process.phase)
            .borrow_mut()
            .schedule(process.clone(), keep_alive, immediate);
    }

    pub fn cancel(&self, process: &Process) {
        self.step(process.phase).borrow_mut().cancel(process.id);
        self.inner.late.borrow_mut().retain(|p| p.id != process.id);
    }

    pub fn setup(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::Setup, cb, false, false)
    }

    pub fn read(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::Read, cb, false, false)
    }

    pub fn resolve_keyframes(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::ResolveKeyframes, cb, false, false)
    }

    pub fn pre_update(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::PreUpdate, cb, false, false)
    }

    pub fn update(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::Update, cb, false, false)
    }

    pub fn pre_render(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::PreRender, cb, false, false)
    }

    pub fn render(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::Render, cb, false, false)
    }

    pub fn post_render(&self, cb: impl FnMut(&FrameData) + 'static) -> Process {
        self.schedule(Phase::PostRender, cb, false, false)
    }

    /// Number of processes waiting for the next pass of `phase`.
    pub fn pending(&self, phase: Phase) -> usize {
        self.step(phase).borrow().pending_len()
    }

    pub fn is_idle(&self) -> bool {
        !self.frame_requested()
            && Phase::ALL
                .iter()
                .all(|p| !self.step(*p).borrow().has_pending())
    }

    /// Drop every scheduled process and reset timing.
    pub fn teardown(&self) {
        for step in &self.inner.steps {
            step.borrow_mut().clear();
        }
        self.inner.late.borrow_mut().clear();
        self.inner.state.set(FrameData::default());
        self.inner.run_next_frame.set(false);
        self.inner.use_default_elapsed.set(true);
        self.inner.frame_pending.set(false);
    }

    fn step(&self, phase: Phase) -> &RefCell<RenderStep> {
        &self.inner.steps[phase.index()]
    }

    fn wake(&self) {
        self.inner.run_next_frame.set(true);
        self.inner.use_default_elapsed.set(true);
        if !self.inner.state.get().is_processing {
            self.request_frame();
        }
    }

    fn request_frame(&self) {
        self.inner.frame_pending.set(true);
        let host = self.inner.host.borrow().clone();
        if let Some(host) = host {
            host.request_frame();
        }
    }

    /// Run one host frame: all eight phases in order.
    pub fn process_batch(&self) {
        let inner = &*self.inner;
        inner.frame_pending.set(false);
        let prev = inner.state.get();
        let (timestamp, delta) = if inner.manual_timing {
            (prev.timestamp + DEFAULT_FRAME_MS, DEFAULT_FRAME_MS)
        } else {
            let now = inner.clock.now();
            let delta = if inner.use_default_elapsed.get() {
                DEFAULT_FRAME_MS
            } else {
                (now - prev.timestamp).min(inner.max_elapsed).max(1.0)
            };
            (now, delta)
        };
        inner.run_next_frame.set(false);
        inner.state.set(FrameData {
            timestamp,
            delta,
            is_processing: true,
        });
        trace!("frame batch at {timestamp:.2}ms (delta {delta:.2}ms)");

        {
            let _guard = BatchGuard(inner);
            for phase in Phase::ALL {
                inner.current_phase.set(Some(phase));
                self.run_step(phase);
            }
            self.run_late_work();
        }

        if inner.run_next_frame.get() {
            inner.use_default_elapsed.set(false);
            self.request_frame();
        }
    }

    /// Immediate work scheduled into an already finished phase reruns the
    /// batch once, synchronously.
    fn run_late_work(&self) {
        let inner = &*self.inner;
        if inner.late.borrow().is_empty() {
            return;
        }
        debug!("rerunning frame batch for late immediate work");
        inner.in_rerun.set(true);
        let _guard = RerunGuard(inner);
        for phase in Phase::ALL {
            inner.current_phase.set(Some(phase));
            let batch: Vec<Process> = {
                let mut late = inner.late.borrow_mut();
                let (mine, rest): (Vec<Process>, Vec<Process>) =
                    late.drain(..).partition(|p| p.phase == phase);
                *late = rest;
                mine
            };
            if batch.is_empty() {
                continue;
            }
            let step = self.step(phase);
            {
                let mut s = step.borrow_mut();
                if s.is_processing {
                    continue;
                }
                s.begin_with(batch);
            }
            self.drain_step(phase);
        }
    }

    /// Synchronously flush a subset of phases with the current frame data.
    pub fn process_steps(&self, phases: &[Phase]) {
        for phase in phases {
            self.run_step(*phase);
        }
    }

    fn run_step(&self, phase: Phase) {
        {
            let mut step = self.step(phase).borrow_mut();
            if step.is_processing {
                step.flush_next_frame = true;
                return;
            }
            step.begin();
        }
        self.drain_step(phase);
    }

    fn drain_step(&self, phase: Phase) {
        let cell = self.step(phase);
        {
            let _guard = StepGuard(cell);
            let mut index = 0;
            loop {
                let next = cell.borrow().get(index).cloned();
                let Some(process) = next else { break };
                index += 1;

                let keep_alive = cell.borrow().is_kept_alive(process.id);
                if keep_alive {
                    cell.borrow_mut().schedule(process.clone(), false, false);
                    self.inner.run_next_frame.set(true);
                }

                let data = self.inner.state.get();
                match process.callback.try_borrow_mut() {
                    Ok(mut callback) => (&mut *callback)(&data),
                    Err(_) => trace!("skipping re-entrant {:?}", process),
                };
            }
        }

        let flush = std::mem::take(&mut cell.borrow_mut().flush_next_frame);
        if flush {
            self.run_step(phase);
        }
    }

    /// Process frames until no further frame is requested, up to `max_frames`.
    /// Returns the number of frames run.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut count = 0;
        while self.frame_requested() && count < max_frames {
            self.process_batch();
            count += 1;
        }
        count
    }
}

impl fmt::Debug for Frameloop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frameloop")
            .field("state", &self.inner.state.get())
            .field("frame_pending", &self.inner.frame_pending.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_loop() -> (Frameloop, ManualClock) {
        let clock = ManualClock::new(0.0);
        let fl = Frameloop::with_clock(&MotionConfig::default(), Rc::new(clock.clone()));
        (fl, clock)
    }

    #[test]
    fn first_frame_uses_default_delta_then_clamps() {
        let (fl, clock) = manual_loop();
        fl.update(|_| {});
        assert!(fl.frame_requested());
        clock.set(1000.0);
        fl.process_batch();
        assert_eq!(fl.state().delta, DEFAULT_FRAME_MS);

        fl.schedule(Phase::Update, |_| {}, true, false);
        fl.process_batch();
        clock.advance(500.0);
        fl.process_batch();
        assert_eq!(fl.state().delta, 40.0);
        clock.advance(0.2);
        fl.process_batch();
        assert_eq!(fl.state().delta, 1.0);
    }

    #[test]
    fn phases_run_in_order() {
        let (fl, _clock) = manual_loop();
        let log = Rc::new(RefCell::new(Vec::new()));
        for phase in Phase::ALL.iter().rev() {
            let log = log.clone();
            let p = *phase;
            fl.schedule(p, move |_| log.borrow_mut().push(p), false, false);
        }
        fl.process_batch();
        assert_eq!(*log.borrow(), Phase::ALL.to_vec());
        assert!(!fl.state().is_processing);
    }

    #[test]
    fn cancelled_process_does_not_run() {
        let (fl, _clock) = manual_loop();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let p = fl.render(move |_| h.set(h.get() + 1));
        fl.cancel(&p);
        fl.process_batch();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn same_process_runs_once_per_frame() {
        let (fl, _clock) = manual_loop();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let p = fl.create_process(Phase::Read, move |_| h.set(h.get() + 1));
        fl.schedule_process(&p, false, false);
        fl.schedule_process(&p, false, false);
        fl.process_batch();
        assert_eq!(hits.get(), 1);
    }
}

//! Software animation: samples a generator once per update phase.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::trace;

use kinema_api_core::{mixer, Mixer, Value};

use super::transition::{AnimationType, RepeatType, ValueAnimationOptions};
use super::{get_final_keyframe, AnimationPlaybackControls, AnimationState};
use crate::frameloop::{Frameloop, Phase, Process};
use crate::generators::keyframes::DEFAULT_DURATION;
use crate::generators::{
    calc_generator_duration, inertia, keyframes, spring, Generator, GeneratorState, KeyframesOptions,
};

pub type JsAnimationOptions = ValueAnimationOptions;

/// How a numeric generator's output becomes a value.
enum NumberMap {
    /// Keep the unit of the template.
    Template(Value),
    /// Output runs 0..100 and is mixed between the first and last keyframe.
    Percent(Mixer),
}

struct NumericGenerator {
    generator: Box<dyn Generator<f64>>,
    map: NumberMap,
}

impl Generator<Value> for NumericGenerator {
    fn next(&mut self, t: f64) -> GeneratorState<Value> {
        let state = self.generator.next(t);
        let value = match &self.map {
            NumberMap::Template(template) => template.with_number(state.value),
            NumberMap::Percent(mix) => mix(state.value / 100.0),
        };
        GeneratorState {
            value,
            done: state.done,
        }
    }

    fn calculated_duration(&self) -> Option<f64> {
        self.generator.calculated_duration()
    }
}

fn build_generator(options: &ValueAnimationOptions, frames: &[Value], velocity: f64) -> Box<dyn Generator<Value>> {
    match options.kind {
        AnimationType::Keyframes | AnimationType::Instant => {
            let duration = match options.kind {
                AnimationType::Instant => 0.0,
                _ => options.duration.unwrap_or(DEFAULT_DURATION),
            };
            Box::new(keyframes(KeyframesOptions {
                keyframes: frames.to_vec(),
                duration,
                ease: options.ease.clone(),
                times: options.times.clone(),
            }))
        }
        AnimationType::Spring | AnimationType::Inertia => {
            let zero = Value::Number(0.0);
            let first = frames.first().unwrap_or(&zero);
            let last = frames.last().unwrap_or(first);
            let numeric = match (first.as_number(), last.as_number()) {
                (Some(a), Some(b)) if first.kind() == last.kind() => Some((a, b)),
                _ => None,
            };
            let (origin, target, map) = match numeric {
                Some((a, b)) => (a, b, NumberMap::Template(last.clone())),
                None => (0.0, 100.0, NumberMap::Percent(mixer(first.clone(), last.clone()))),
            };
            let generator: Box<dyn Generator<f64>> = if options.kind == AnimationType::Spring {
                let mut o = options.spring_options(origin, target);
                o.velocity = velocity;
                Box::new(spring(o))
            } else {
                let mut o = options.inertia_options(origin);
                o.velocity = velocity;
                Box::new(inertia(o))
            };
            Box::new(NumericGenerator { generator, map })
        }
    }
}

struct Playback {
    generator: Box<dyn Generator<Value>>,
    mirrored: Option<Box<dyn Generator<Value>>>,
    calculated_duration: f64,
    resolved_duration: f64,
    total_duration: f64,
    state: AnimationState,
    hold_time: Option<f64>,
    start_time: Option<f64>,
    cancel_time: Option<f64>,
    current_time: f64,
    speed: f64,
    is_stopped: bool,
}

struct JsInner {
    options: ValueAnimationOptions,
    playback: RefCell<Playback>,
    frameloop: Frameloop,
    driver: RefCell<Option<Process>>,
    on_finish: RefCell<Vec<Box<dyn FnOnce()>>>,
    finishing: Cell<bool>,
    /// Set once `then` callbacks have been released; cleared on replay.
    finished: Cell<bool>,
}

/// Generator-driven animation ticked by the frame loop.
#[derive(Clone)]
pub struct JsAnimation {
    inner: Rc<JsInner>,
}

impl JsAnimation {
    pub fn new(frameloop: &Frameloop, options: JsAnimationOptions) -> Self {
        let frames = &options.keyframes;
        let mut generator = build_generator(&options, frames, options.velocity);
        let mirrored = (options.repeat_type == RepeatType::Mirror).then(|| {
            let reversed: Vec<Value> = frames.iter().rev().cloned().collect();
            build_generator(&options, &reversed, -options.velocity)
        });
        let calculated_duration = generator
            .calculated_duration()
            .or_else(|| calc_generator_duration(generator.as_mut()))
            .unwrap_or(f64::INFINITY);
        let resolved_duration = calculated_duration + options.repeat_delay;
        let total_duration = resolved_duration * (options.repeat + 1.0) - options.repeat_delay;

        let autoplay = options.autoplay;
        let animation = Self {
            inner: Rc::new(JsInner {
                playback: RefCell::new(Playback {
                    generator,
                    mirrored,
                    calculated_duration,
                    resolved_duration,
                    total_duration,
                    state: AnimationState::Idle,
                    hold_time: None,
                    start_time: None,
                    cancel_time: None,
                    current_time: 0.0,
                    speed: 1.0,
                    is_stopped: false,
                }),
                options,
                frameloop: frameloop.clone(),
                driver: RefCell::new(None),
                on_finish: RefCell::new(Vec::new()),
                finishing: Cell::new(false),
                finished: Cell::new(false),
            }),
        };
        if autoplay {
            animation.play();
        } else {
            animation.pause();
        }
        animation
    }

    pub fn options(&self) -> &JsAnimationOptions {
        &self.inner.options
    }

    /// Sample at `t` milliseconds without callbacks or state changes.
    pub fn sample(&self, t: f64) -> GeneratorState<Value> {
        self.inner.playback.borrow_mut().start_time = Some(0.0);
        self.tick(t, true).0
    }

    /// Advance to `timestamp` and write the value. Returns whether the
    /// animation finished on this tick.
    fn tick(&self, timestamp: f64, sample: bool) -> (GeneratorState<Value>, bool) {
        let options = &self.inner.options;
        let frames = &options.keyframes;
        let mut p = self.inner.playback.borrow_mut();
        let p = &mut *p;

        let Some(mut start_time) = p.start_time else {
            return (p.generator.next(0.0), false);
        };
        if p.speed > 0.0 {
            start_time = start_time.min(timestamp);
        } else if p.speed < 0.0 {
            start_time = start_time.min(timestamp - p.total_duration / p.speed);
        }
        p.start_time = Some(start_time);

        p.current_time = if sample {
            timestamp
        } else if let Some(hold) = p.hold_time {
            hold
        } else {
            (timestamp - start_time).round() * p.speed
        };

        let direction = if p.speed >= 0.0 { 1.0 } else { -1.0 };
        let time_without_delay = p.current_time - options.delay * direction;
        let in_delay = if p.speed >= 0.0 {
            time_without_delay < 0.0
        } else {
            time_without_delay > p.total_duration
        };
        p.current_time = time_without_delay.max(0.0);
        if p.state == AnimationState::Finished && p.hold_time.is_none() {
            p.current_time = p.total_duration;
        }

        let mut elapsed = p.current_time;
        let mut use_mirror = false;
        if options.repeat != 0.0 {
            let progress = p.current_time.min(p.total_duration) / p.resolved_duration;
            let mut iteration = progress.floor();
            let mut iteration_progress = progress % 1.0;
            if iteration_progress == 0.0 && progress >= 1.0 {
                iteration_progress = 1.0;
            }
            if iteration_progress == 1.0 {
                iteration -= 1.0;
            }
            iteration = iteration.min(options.repeat + 1.0);
            if iteration % 2.0 == 1.0 {
                match options.repeat_type {
                    RepeatType::Reverse => {
                        iteration_progress = 1.0 - iteration_progress;
                        if options.repeat_delay != 0.0 {
                            iteration_progress -= options.repeat_delay / p.resolved_duration;
                        }
                    }
                    RepeatType::Mirror => use_mirror = true,
                    RepeatType::Loop => {}
                }
            }
            elapsed = iteration_progress.clamp(0.0, 1.0) * p.resolved_duration;
        }

        let mut state = if in_delay {
            GeneratorState {
                value: frames.first().cloned().unwrap_or(Value::Number(0.0)),
                done: false,
            }
        } else {
            match (use_mirror, p.mirrored.as_mut()) {
                (true, Some(mirrored)) => mirrored.next(elapsed),
                _ => p.generator.next(elapsed),
            }
        };

        if !in_delay {
            state.done = if p.speed >= 0.0 {
                p.current_time >= p.total_duration
            } else {
                p.current_time <= 0.0
            };
        }

        let finished = !sample
            && p.hold_time.is_none()
            && (p.state == AnimationState::Finished || (p.state == AnimationState::Running && state.done));
        if finished && options.kind != AnimationType::Inertia {
            let as_options: Vec<Option<Value>> = frames.iter().cloned().map(Some).collect();
            if let Some(v) = get_final_keyframe(
                &as_options,
                options.repeat,
                options.repeat_type,
                options.final_keyframe.as_ref(),
                p.speed,
            ) {
                state.value = v;
            }
        }
        (state, finished)
    }

    fn on_frame(&self, timestamp: f64) {
        let (state, finished) = self.tick(timestamp, false);
        if let Some(on_update) = &self.inner.options.callbacks.on_update {
            on_update(&state.value);
        }
        if finished {
            self.finish();
        }
    }

    fn start_driver(&self) {
        let process = {
            let mut driver = self.inner.driver.borrow_mut();
            driver
                .get_or_insert_with(|| {
                    // The running driver keeps the animation alive; dropped on teardown.
                    let this = self.clone();
                    self.inner
                        .frameloop
                        .create_process(Phase::Update, move |data| this.on_frame(data.timestamp))
                })
                .clone()
        };
        self.inner.frameloop.schedule_process(&process, true, true);
    }

    fn stop_driver(&self) {
        let process = self.inner.driver.borrow_mut().take();
        if let Some(process) = process {
            self.inner.frameloop.cancel(&process);
        }
    }

    fn resolve_finished(&self) {
        if self.inner.finishing.replace(true) {
            return;
        }
        self.inner.finished.set(true);
        let callbacks = std::mem::take(&mut *self.inner.on_finish.borrow_mut());
        for cb in callbacks {
            cb();
        }
        self.inner.finishing.set(false);
    }

    fn teardown(&self) {
        {
            let mut p = self.inner.playback.borrow_mut();
            p.state = AnimationState::Idle;
            p.start_time = None;
            p.cancel_time = None;
        }
        self.stop_driver();
        self.resolve_finished();
    }

    fn finish(&self) {
        self.teardown();
        self.inner.playback.borrow_mut().state = AnimationState::Finished;
        trace!("animation of {:?} finished", self.inner.options.name);
        if let Some(on_complete) = &self.inner.options.callbacks.on_complete {
            on_complete();
        }
    }

    /// Total playback length including repeats, in milliseconds.
    pub fn total_duration(&self) -> f64 {
        self.inner.playback.borrow().total_duration
    }
}

impl AnimationPlaybackControls for JsAnimation {
    fn play(&self) {
        if self.inner.playback.borrow().is_stopped {
            return;
        }
        if let Some(on_play) = &self.inner.options.callbacks.on_play {
            on_play();
        }
        self.inner.finished.set(false);
        let now = self.inner.frameloop.now();
        {
            let mut p = self.inner.playback.borrow_mut();
            if let Some(hold) = p.hold_time {
                p.start_time = Some(now - hold);
            } else if p.start_time.is_none() {
                p.start_time = Some(self.inner.options.start_time.unwrap_or(now));
            } else if p.state == AnimationState::Finished {
                p.start_time = Some(now);
            }
            p.cancel_time = p.start_time;
            p.hold_time = None;
            p.state = AnimationState::Running;
        }
        self.start_driver();
    }

    fn pause(&self) {
        let mut p = self.inner.playback.borrow_mut();
        p.state = AnimationState::Paused;
        p.hold_time = Some(p.current_time);
    }

    fn stop(&self) {
        {
            let mut p = self.inner.playback.borrow_mut();
            p.is_stopped = true;
            if p.state == AnimationState::Idle {
                return;
            }
        }
        self.teardown();
        if let Some(on_stop) = &self.inner.options.callbacks.on_stop {
            on_stop();
        }
    }

    fn complete(&self) {
        if self.state() != AnimationState::Running {
            self.play();
        }
        {
            let mut p = self.inner.playback.borrow_mut();
            p.state = AnimationState::Finished;
            p.hold_time = None;
        }
        self.on_frame(self.inner.frameloop.now());
    }

    fn cancel(&self) {
        let cancel_time = self.inner.playback.borrow().cancel_time;
        if let Some(t) = cancel_time {
            let (state, _) = self.tick(t, false);
            if let Some(on_update) = &self.inner.options.callbacks.on_update {
                on_update(&state.value);
            }
        }
        self.teardown();
    }

    fn then(&self, on_finish: Box<dyn FnOnce()>) {
        if self.inner.finished.get() {
            on_finish();
        } else {
            self.inner.on_finish.borrow_mut().push(on_finish);
        }
    }

    fn time(&self) -> f64 {
        self.inner.playback.borrow().current_time
    }

    fn set_time(&self, ms: f64) {
        let now = self.inner.frameloop.now();
        let has_driver = self.inner.driver.borrow().is_some();
        let mut p = self.inner.playback.borrow_mut();
        p.current_time = ms;
        if p.hold_time.is_some() || p.speed == 0.0 {
            p.hold_time = Some(ms);
        } else if has_driver {
            p.start_time = Some(now - ms / p.speed);
        }
    }

    fn speed(&self) -> f64 {
        self.inner.playback.borrow().speed
    }

    fn set_speed(&self, speed: f64) {
        let current = {
            let mut p = self.inner.playback.borrow_mut();
            if p.speed == speed {
                return;
            }
            p.speed = speed;
            p.current_time
        };
        self.set_time(current);
    }

    fn duration(&self) -> f64 {
        self.inner.playback.borrow().calculated_duration
    }

    fn state(&self) -> AnimationState {
        self.inner.playback.borrow().state
    }
}

impl fmt::Debug for JsAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.inner.playback.borrow();
        f.debug_struct("JsAnimation")
            .field("name", &self.inner.options.name)
            .field("state", &p.state)
            .field("current_time", &p.current_time)
            .field("total_duration", &p.total_duration)
            .finish()
    }
}

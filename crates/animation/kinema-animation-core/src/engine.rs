//! Engine: the frame loop, resolver queue, configuration and host
//! collaborators shared by every animation.

use std::fmt;
use std::rc::Rc;

use log::debug;
use once_cell::unsync::OnceCell;

use kinema_api_core::Value;

use crate::animation::{HandoffSource, NativeAnimator};
use crate::config::{MotionConfig, ReducedMotionPolicy};
use crate::frameloop::{Clock, FrameHost, Frameloop, SystemClock};
use crate::motion_value::MotionValue;
use crate::resolver::ResolverQueue;

/// Host environment queries.
pub trait Environment {
    fn prefers_reduced_motion(&self) -> bool;
}

struct EngineInner {
    config: MotionConfig,
    frameloop: Frameloop,
    resolvers: ResolverQueue,
    native: Option<Rc<dyn NativeAnimator>>,
    handoff: Option<Rc<dyn HandoffSource>>,
    environment: Option<Rc<dyn Environment>>,
    reduced_motion: OnceCell<bool>,
}

#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

pub struct EngineBuilder {
    config: MotionConfig,
    clock: Option<Rc<dyn Clock>>,
    host: Option<Rc<dyn FrameHost>>,
    native: Option<Rc<dyn NativeAnimator>>,
    handoff: Option<Rc<dyn HandoffSource>>,
    environment: Option<Rc<dyn Environment>>,
}

impl EngineBuilder {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            clock: None,
            host: None,
            native: None,
            handoff: None,
            environment: None,
        }
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn frame_host(mut self, host: Rc<dyn FrameHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn native_animator(mut self, animator: Rc<dyn NativeAnimator>) -> Self {
        self.native = Some(animator);
        self
    }

    pub fn handoff(mut self, source: Rc<dyn HandoffSource>) -> Self {
        self.handoff = Some(source);
        self
    }

    pub fn environment(mut self, environment: Rc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn build(self) -> Engine {
        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock::new()));
        let frameloop = Frameloop::with_clock(&self.config, clock);
        if let Some(host) = self.host {
            frameloop.set_host(host);
        }
        let resolvers = ResolverQueue::new(&frameloop);
        debug!(
            "engine built (manual timing: {}, native: {})",
            self.config.use_manual_timing,
            self.native.is_some()
        );
        Engine {
            inner: Rc::new(EngineInner {
                config: self.config,
                frameloop,
                resolvers,
                native: self.native,
                handoff: self.handoff,
                environment: self.environment,
                reduced_motion: OnceCell::new(),
            }),
        }
    }
}

impl Engine {
    pub fn new(config: MotionConfig) -> Self {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: MotionConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &MotionConfig {
        &self.inner.config
    }

    pub fn frameloop(&self) -> &Frameloop {
        &self.inner.frameloop
    }

    pub fn resolvers(&self) -> &ResolverQueue {
        &self.inner.resolvers
    }

    pub fn native_animator(&self) -> Option<&Rc<dyn NativeAnimator>> {
        self.inner.native.as_ref()
    }

    pub fn handoff(&self) -> Option<&Rc<dyn HandoffSource>> {
        self.inner.handoff.as_ref()
    }

    pub fn motion_value(&self, init: impl Into<Value>) -> MotionValue {
        MotionValue::with_velocity_window(&self.inner.frameloop, init, self.inner.config.velocity_window_ms)
    }

    /// Reduced-motion decision. The environment is asked at most once.
    pub fn should_reduce_motion(&self) -> bool {
        match self.inner.config.reduced_motion {
            ReducedMotionPolicy::Always => true,
            ReducedMotionPolicy::Never => false,
            ReducedMotionPolicy::User => *self.inner.reduced_motion.get_or_init(|| {
                self.inner
                    .environment
                    .as_ref()
                    .map(|env| env.prefers_reduced_motion())
                    .unwrap_or(false)
            }),
        }
    }

    /// Resolve every pending keyframe resolver now.
    pub fn flush_keyframes(&self) {
        self.inner.resolvers.flush();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("frameloop", &self.inner.frameloop)
            .field("resolvers", &self.inner.resolvers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingEnv {
        asked: Cell<u32>,
    }

    impl Environment for CountingEnv {
        fn prefers_reduced_motion(&self) -> bool {
            self.asked.set(self.asked.get() + 1);
            true
        }
    }

    #[test]
    fn reduced_motion_read_once() {
        let env = Rc::new(CountingEnv { asked: Cell::new(0) });
        let engine = Engine::builder(MotionConfig::manual()).environment(env.clone()).build();
        assert!(engine.should_reduce_motion());
        assert!(engine.should_reduce_motion());
        assert_eq!(env.asked.get(), 1);
    }

    #[test]
    fn policy_overrides_environment() {
        let env = Rc::new(CountingEnv { asked: Cell::new(0) });
        let config = MotionConfig {
            reduced_motion: ReducedMotionPolicy::Never,
            ..MotionConfig::manual()
        };
        let engine = Engine::builder(config).environment(env.clone()).build();
        assert!(!engine.should_reduce_motion());
        assert_eq!(env.asked.get(), 0);
    }
}

//! Visibility-aware, frame-rate-limited driver for a [`Simulation`].
//!
//! The loop never touches a clock or an event source directly. Everything
//! outside the simulation is reached through [`Host`] and [`Clock`], so a test
//! can step it frame by frame with fake time.

use crate::render::Canvas;
use crate::sim::Simulation;
use rand::{rngs::StdRng, Rng};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Upper bound on the simulated time a single frame may consume.
pub const MAX_FRAME_DT: Duration = Duration::from_millis(250);

const FPS_WINDOW: Duration = Duration::from_secs(1);

pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle(pub u64);

/// The embedding surface.
///
/// A host delivers a pending frame by calling [`FrameLoop::tick`], an expired
/// timer by calling [`FrameLoop::on_timer`] and a size change by calling
/// [`FrameLoop::notify_resize`]. Cancelled handles must not be delivered.
pub trait Host {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
    fn set_timer(&mut self, delay: Duration) -> TimerHandle;
    fn cancel_timer(&mut self, handle: TimerHandle);
    fn observe_resize(&mut self) -> ObserverHandle;
    fn unobserve_resize(&mut self, handle: ObserverHandle);
    fn is_visible(&self) -> bool;
    /// Logical display size.
    fn display_size(&self) -> (f32, f32);
    /// Backing-store pixels per logical unit.
    fn pixel_ratio(&self) -> f32;
    fn canvas(&mut self) -> Option<&mut Canvas>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Starting,
    Running,
    Suspended,
    TornDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending, or the loop is not live.
    Ignored,
    Suspended,
    /// Too early for a frame; another was requested.
    Waiting,
    Drawn,
}

#[derive(Debug, Default)]
struct FpsCounter {
    window_start: Option<Duration>,
    frames: u32,
    last: Option<f32>,
}

impl FpsCounter {
    /// Returns the rate when a window closes.
    fn frame(&mut self, now: Duration) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_sub(start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.last = Some(fps);
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }

    fn reset_window(&mut self) {
        self.window_start = None;
        self.frames = 0;
    }
}

pub struct FrameLoop<H: Host, C: Clock, R: Rng = StdRng> {
    host: H,
    clock: C,
    sim: Simulation<R>,
    state: LoopState,

    frame: Option<FrameHandle>,
    start_timer: Option<TimerHandle>,
    resize_timer: Option<TimerHandle>,
    observer: Option<ObserverHandle>,

    last: Option<Duration>,
    accumulated: Duration,
    fps: FpsCounter,
    debug_fps: bool,
}

impl<H: Host, C: Clock, R: Rng> FrameLoop<H, C, R> {
    pub fn new(host: H, clock: C, sim: Simulation<R>) -> Self {
        let debug_fps = sim.config().debug_fps;
        Self {
            host,
            clock,
            sim,
            state: LoopState::Idle,
            frame: None,
            start_timer: None,
            resize_timer: None,
            observer: None,
            last: None,
            accumulated: Duration::ZERO,
            fps: FpsCounter::default(),
            debug_fps,
        }
    }

    /// Sizes the surface and schedules the first frame.
    ///
    /// Returns `false` and stays idle when the host has no canvas.
    pub fn start(&mut self) -> bool {
        if self.state != LoopState::Idle {
            return false;
        }
        if self.host.canvas().is_none() {
            debug!("no canvas available, not starting");
            return false;
        }

        let (w, _) = self.layout();
        self.observer = Some(self.host.observe_resize());

        let cfg = self.sim.config();
        if cfg.start_delay_ms > 0 && w < cfg.small_viewport_width {
            let delay = cfg.start_delay();
            self.start_timer = Some(self.host.set_timer(delay));
            self.state = LoopState::Starting;
            debug!(?delay, "start deferred on small viewport");
        } else {
            self.begin_running();
        }
        true
    }

    /// Consumes the pending frame request.
    pub fn tick(&mut self) -> TickOutcome {
        if !matches!(self.state, LoopState::Running | LoopState::Suspended) {
            return TickOutcome::Ignored;
        }
        if self.frame.take().is_none() {
            return TickOutcome::Ignored;
        }

        if !self.host.is_visible() {
            if self.state != LoopState::Suspended {
                debug!("surface hidden, suspending");
            }
            self.state = LoopState::Suspended;
            self.last = None;
            self.accumulated = Duration::ZERO;
            self.fps.reset_window();
            self.request();
            return TickOutcome::Suspended;
        }

        if self.state == LoopState::Suspended {
            debug!("surface visible, resuming");
            self.state = LoopState::Running;
        }

        let now = self.clock.now();
        match self.last.replace(now) {
            None => {
                self.request();
                return TickOutcome::Waiting;
            }
            Some(prev) => self.accumulated += now.saturating_sub(prev),
        }

        if self.accumulated < self.sim.config().frame_interval() {
            self.request();
            return TickOutcome::Waiting;
        }

        let dt = self.accumulated.min(MAX_FRAME_DT);
        self.accumulated = Duration::ZERO;

        self.sim.advance(dt);
        self.redraw();

        if let Some(fps) = self.fps.frame(now) {
            if self.debug_fps {
                info!("fps: {fps:.1}");
            }
        }

        self.request();
        TickOutcome::Drawn
    }

    /// Delivers an expired timer. Unknown or stale handles are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) -> TickOutcome {
        if self.start_timer == Some(handle) {
            self.start_timer = None;
            if self.state == LoopState::Starting {
                self.begin_running();
            }
            return TickOutcome::Waiting;
        }

        if self.resize_timer == Some(handle) {
            self.resize_timer = None;
            let (w, h) = self.layout();
            debug!(width = w, height = h, "resize settled");
            self.redraw();
            return TickOutcome::Drawn;
        }

        TickOutcome::Ignored
    }

    /// Restarts the resize debounce.
    pub fn notify_resize(&mut self) {
        if matches!(self.state, LoopState::Idle | LoopState::TornDown) {
            return;
        }
        if let Some(t) = self.resize_timer.take() {
            self.host.cancel_timer(t);
        }
        let delay = self.sim.config().resize_debounce();
        self.resize_timer = Some(self.host.set_timer(delay));
    }

    /// Cancels every outstanding request. Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.state == LoopState::TornDown {
            return;
        }
        if let Some(f) = self.frame.take() {
            self.host.cancel_frame(f);
        }
        if let Some(t) = self.start_timer.take() {
            self.host.cancel_timer(t);
        }
        if let Some(t) = self.resize_timer.take() {
            self.host.cancel_timer(t);
        }
        if let Some(o) = self.observer.take() {
            self.host.unobserve_resize(o);
        }
        self.state = LoopState::TornDown;
        debug!("frame loop torn down");
    }

    pub fn set_regeneration_key(&mut self, key: u64) -> bool {
        self.sim.set_regeneration_key(key)
    }

    pub fn set_debug_fps(&mut self, on: bool) {
        self.debug_fps = on;
    }

    pub fn debug_fps(&self) -> bool {
        self.debug_fps
    }

    /// Most recent completed FPS measurement.
    pub fn fps(&self) -> Option<f32> {
        self.fps.last
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn simulation(&self) -> &Simulation<R> {
        &self.sim
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn begin_running(&mut self) {
        self.state = LoopState::Running;
        self.last = None;
        self.accumulated = Duration::ZERO;
        self.request();
    }

    fn request(&mut self) {
        if let Some(f) = self.frame.take() {
            self.host.cancel_frame(f);
        }
        self.frame = Some(self.host.request_frame());
    }

    /// Resizes the backing store and the simulation to the host's current size.
    fn layout(&mut self) -> (f32, f32) {
        let (w, h) = self.host.display_size();
        let ratio = sanitize_ratio(self.host.pixel_ratio());
        if let Some(canvas) = self.host.canvas() {
            canvas.resize(backing_len(w, ratio), backing_len(h, ratio));
        }
        self.sim.resize(w, h);
        (w, h)
    }

    fn redraw(&mut self) {
        let ratio = sanitize_ratio(self.host.pixel_ratio());
        if let Some(canvas) = self.host.canvas() {
            canvas.clear();
            self.sim.render(canvas, ratio);
        }
    }
}

impl<H: Host, C: Clock, R: Rng> Drop for FrameLoop<H, C, R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn sanitize_ratio(r: f32) -> f32 {
    if r.is_finite() && r > 0.0 {
        r
    } else {
        1.0
    }
}

fn backing_len(logical: f32, ratio: f32) -> u32 {
    if logical.is_finite() && logical > 0.0 {
        (logical * ratio).ceil() as u32
    } else {
        0
    }
}

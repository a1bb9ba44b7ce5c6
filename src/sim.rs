use crate::bubble::{Bubble, BubblePool};
use crate::config::BubbleConfig;
use crate::grid::OccupancyGrid;
use crate::noise::Noise;
use crate::physics::Integrator;
use crate::render::{Canvas, Renderer};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// Everything that evolves between frames, in logical units.
///
/// The pool is rebuilt only by [`Simulation::resize`] with a new size or by a
/// changed regeneration key.
pub struct Simulation<R: Rng = StdRng> {
    cfg: BubbleConfig,
    rng: R,
    noise: Noise,
    pool: BubblePool,
    grid: OccupancyGrid,
    integrator: Integrator,
    renderer: Renderer,
    width: f32,
    height: f32,
    time: f32,
    regeneration_key: u64,
}

impl Simulation<StdRng> {
    /// Seeds from `cfg.seed`, or from OS entropy when unset.
    pub fn new(cfg: BubbleConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(cfg, rng)
    }
}

impl<R: Rng> Simulation<R> {
    pub fn with_rng(cfg: BubbleConfig, mut rng: R) -> Self {
        let cfg = cfg.sanitized();
        let noise = Noise::new(&mut rng);
        let grid = OccupancyGrid::new(cfg.grid_cell_size);
        let regeneration_key = cfg.regeneration_key;
        Self {
            cfg,
            rng,
            noise,
            pool: BubblePool::default(),
            grid,
            integrator: Integrator::new(),
            renderer: Renderer,
            width: 0.0,
            height: 0.0,
            time: 0.0,
            regeneration_key,
        }
    }

    /// Adopts a new logical size, reallocating the grid and re-placing bubbles.
    ///
    /// Returns `false` when the size is unchanged and the pool was kept.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        let (width, height) = (width.max(0.0), height.max(0.0));
        if width == self.width && height == self.height && !self.pool.is_empty() {
            return false;
        }
        self.width = width;
        self.height = height;
        debug!(width, height, "simulation resized");
        self.regenerate();
        true
    }

    pub fn regenerate(&mut self) {
        self.grid.allocate(self.width, self.height);
        self.pool = BubblePool::place(&mut self.rng, &self.cfg, self.width, self.height);
        debug!(
            bubbles = self.pool.len(),
            key = self.regeneration_key,
            "bubble pool regenerated"
        );
    }

    /// Rebuilds the pool when `key` differs from the current one.
    pub fn set_regeneration_key(&mut self, key: u64) -> bool {
        if key == self.regeneration_key {
            return false;
        }
        self.regeneration_key = key;
        self.regenerate();
        true
    }

    /// Advances simulated time by `dt` and steps the physics once.
    pub fn advance(&mut self, dt: Duration) {
        self.time += dt.as_secs_f32();
        self.integrator.step(
            self.pool.as_mut_slice(),
            &mut self.grid,
            &self.noise,
            &self.cfg,
            self.width,
            self.height,
            self.time,
        );
    }

    pub fn render(&self, canvas: &mut Canvas, scale: f32) {
        self.renderer
            .draw(canvas, self.pool.as_slice(), scale, self.time, &self.cfg);
    }

    pub fn bubbles(&self) -> &[Bubble] {
        self.pool.as_slice()
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn config(&self) -> &BubbleConfig {
        &self.cfg
    }

    /// Simulated seconds since construction.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn regeneration_key(&self) -> u64 {
        self.regeneration_key
    }
}

//! Per-frame force accumulation and integration.

use crate::bubble::{Bubble, EDGE_PAD};
use crate::config::BubbleConfig;
use crate::grid::OccupancyGrid;
use crate::noise::Noise;
use std::f32::consts::TAU;

pub const MAX_SPEED: f32 = 4.0;
pub const DAMPING: f32 = 0.93;
pub const WALL_BOUNCE: f32 = 0.85;

const SEPARATION_RANGE: f32 = 0.65;
const SEPARATION_GAIN: f32 = 1.8;
const COVERAGE_GAIN: f32 = 0.015;
const CENTROID_GAIN_X: f32 = 0.25;
const CENTROID_GAIN_Y: f32 = 0.15;
const HOME_GAIN: f32 = 0.012;

/// Steps a pool of bubbles one frame at a time.
///
/// Forces are gathered from the state at the start of the frame, then applied
/// to every bubble in one pass. The force buffer is reused between frames.
#[derive(Debug, Default)]
pub struct Integrator {
    forces: Vec<(f32, f32)>,
}

impl Integrator {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        bubbles: &mut [Bubble],
        grid: &mut OccupancyGrid,
        noise: &Noise,
        cfg: &BubbleConfig,
        width: f32,
        height: f32,
        t: f32,
    ) {
        if bubbles.is_empty() {
            return;
        }

        self.gather(bubbles, grid, noise, cfg, width, height, t);

        for (b, &(fx, fy)) in bubbles.iter_mut().zip(self.forces.iter()) {
            b.vx = (b.vx + fx) * DAMPING;
            b.vy = (b.vy + fy) * DAMPING;

            let speed = (b.vx * b.vx + b.vy * b.vy).sqrt();
            if speed > MAX_SPEED {
                let k = MAX_SPEED / speed;
                b.vx *= k;
                b.vy *= k;
            }

            b.x += b.vx;
            b.y += b.vy;

            b.r = b.radius_at(t, cfg);
            let pad = b.r * EDGE_PAD;
            confine(&mut b.x, &mut b.vx, width, pad);
            confine(&mut b.y, &mut b.vy, height, pad);

            grid.stamp(b.x, b.y, b.r);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn gather(
        &mut self,
        bubbles: &[Bubble],
        grid: &OccupancyGrid,
        noise: &Noise,
        cfg: &BubbleConfig,
        width: f32,
        height: f32,
        t: f32,
    ) {
        let n = bubbles.len() as f32;
        let avg_x = bubbles.iter().map(|b| b.x).sum::<f32>() / n;
        let avg_y = bubbles.iter().map(|b| b.y).sum::<f32>() / n;
        let balance = (
            centroid_pull(width, avg_x, CENTROID_GAIN_X),
            centroid_pull(height, avg_y, CENTROID_GAIN_Y),
        );

        let (tx, ty) = grid.lowest_occupancy_target(t);

        self.forces.clear();
        for (i, b) in bubbles.iter().enumerate() {
            let (flx, fly) = flow(b, noise, cfg, t);
            let (sx, sy) = separation(i, bubbles);

            let (mut cx, mut cy) = (tx - b.x, ty - b.y);
            let len = (cx * cx + cy * cy).sqrt();
            if len > f32::EPSILON {
                cx = cx / len * COVERAGE_GAIN;
                cy = cy / len * COVERAGE_GAIN;
            } else {
                cx = 0.0;
                cy = 0.0;
            }

            let hx = (b.home_x - b.x) * HOME_GAIN;
            let hy = (b.home_y - b.y) * HOME_GAIN;

            self.forces.push((
                flx + sx + cx + balance.0 + hx,
                fly + sy + cy + balance.1 + hy,
            ));
        }
    }
}

fn flow(b: &Bubble, noise: &Noise, cfg: &BubbleConfig, t: f32) -> (f32, f32) {
    let phase = b.noise_phase;
    let n = noise.sample(
        b.x * cfg.noise_scale + phase,
        b.y * cfg.noise_scale + t * cfg.noise_time_scale + phase,
    );
    let theta = ((n + 1.0) * 0.5 * TAU).rem_euclid(TAU);
    let mag = cfg.speed * b.jitter;
    (theta.cos() * mag, theta.sin() * mag)
}

fn separation(i: usize, bubbles: &[Bubble]) -> (f32, f32) {
    let me = &bubbles[i];
    let (mut fx, mut fy) = (0.0, 0.0);

    for (j, other) in bubbles.iter().enumerate() {
        if j == i {
            continue;
        }
        let min_d = (me.r + other.r) * SEPARATION_RANGE;
        let dx = me.x - other.x;
        let dy = me.y - other.y;
        let d2 = dx * dx + dy * dy;
        if d2 >= min_d * min_d || min_d <= 0.0 {
            continue;
        }

        let d = d2.sqrt();
        let push = (min_d - d) / min_d * SEPARATION_GAIN;
        if d > f32::EPSILON {
            fx += dx / d * push;
            fy += dy / d * push;
        } else {
            // coincident centers: split the pair along a fixed axis by index
            let a = if i < j { 0.0 } else { std::f32::consts::PI };
            fx += a.cos() * push;
            fy += a.sin() * push;
        }
    }

    (fx, fy)
}

fn centroid_pull(dim: f32, avg: f32, gain: f32) -> f32 {
    if dim > 0.0 {
        (dim * 0.5 - avg) / dim * gain
    } else {
        0.0
    }
}

fn confine(pos: &mut f32, vel: &mut f32, dim: f32, pad: f32) {
    if dim < pad * 2.0 {
        *pos = dim * 0.5;
        *vel = 0.0;
        return;
    }
    if *pos < pad {
        *pos = pad;
        *vel = -*vel * WALL_BOUNCE;
    } else if *pos > dim - pad {
        *pos = dim - pad;
        *vel = -*vel * WALL_BOUNCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubble::{BubblePool, SPACING};
    use rand::{rngs::StdRng, SeedableRng};

    struct Rig {
        cfg: BubbleConfig,
        pool: BubblePool,
        grid: OccupancyGrid,
        noise: Noise,
        integrator: Integrator,
        w: f32,
        h: f32,
    }

    fn rig(seed: u64, count: usize, w: f32, h: f32) -> Rig {
        let cfg = BubbleConfig {
            count,
            ..BubbleConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Noise::new(&mut rng);
        let pool = BubblePool::place(&mut rng, &cfg, w, h);
        let mut grid = OccupancyGrid::new(cfg.grid_cell_size);
        grid.allocate(w, h);
        Rig {
            cfg,
            pool,
            grid,
            noise,
            integrator: Integrator::new(),
            w,
            h,
        }
    }

    impl Rig {
        fn step(&mut self, t: f32) {
            self.integrator.step(
                self.pool.as_mut_slice(),
                &mut self.grid,
                &self.noise,
                &self.cfg,
                self.w,
                self.h,
                t,
            );
        }
    }

    #[test]
    fn invariants_hold_every_frame() {
        let mut rig = rig(42, 10, 1600.0, 900.0);
        for frame in 0..600 {
            rig.step(frame as f32 / 30.0);
            for b in rig.pool.iter() {
                assert!(b.r >= rig.cfg.radius_min && b.r <= rig.cfg.radius_max);
                let pad = b.r * EDGE_PAD;
                assert!(b.x >= pad - 1e-3 && b.x <= rig.w - pad + 1e-3);
                assert!(b.y >= pad - 1e-3 && b.y <= rig.h - pad + 1e-3);
                assert!((b.vx * b.vx + b.vy * b.vy).sqrt() <= MAX_SPEED + 1e-4);
            }
        }
    }

    #[test]
    fn steps_stamp_the_grid() {
        let mut rig = rig(1, 4, 1200.0, 800.0);
        assert_eq!(rig.grid.total(), 0.0);
        rig.step(0.0);
        let after_one = rig.grid.total();
        assert!(after_one > 0.0);
        rig.step(0.1);
        assert!(rig.grid.total() > after_one);
    }

    #[test]
    fn narrow_axis_centers_the_bubble() {
        let mut rig = rig(5, 1, 1000.0, 1000.0);
        rig.w = 50.0;
        rig.grid.allocate(50.0, 1000.0);
        rig.step(0.0);
        let b = &rig.pool.as_slice()[0];
        assert_eq!(b.x, 25.0);
        assert_eq!(b.vx, 0.0);
    }

    #[test]
    fn wall_contact_reflects_velocity() {
        let mut rig = rig(6, 1, 2000.0, 2000.0);
        {
            let b = &mut rig.pool.as_mut_slice()[0];
            b.x = 0.0;
            b.vx = -3.0;
            b.home_x = 0.0;
        }
        rig.step(0.0);
        let b = &rig.pool.as_slice()[0];
        assert_eq!(b.x, b.r * EDGE_PAD);
        assert!(b.vx > 0.0);
    }

    #[test]
    fn overlapping_pair_is_pushed_apart() {
        let mut rig = rig(8, 2, 3000.0, 3000.0);
        {
            let b = rig.pool.as_mut_slice();
            for (k, bubble) in b.iter_mut().enumerate() {
                bubble.x = 1500.0 + k as f32 * 20.0;
                bubble.y = 1500.0;
                bubble.home_x = bubble.x;
                bubble.home_y = bubble.y;
                bubble.vx = 0.0;
                bubble.vy = 0.0;
                bubble.jitter = 0.0;
            }
        }
        rig.step(0.0);
        let b = rig.pool.as_slice();
        assert!(b[0].vx < 0.0);
        assert!(b[1].vx > 0.0);
    }

    #[test]
    fn coincident_centers_separate_deterministically() {
        let make = || {
            let mut rig = rig(9, 2, 3000.0, 3000.0);
            for bubble in rig.pool.as_mut_slice() {
                bubble.x = 1500.0;
                bubble.y = 1500.0;
                bubble.home_x = 1500.0;
                bubble.home_y = 1500.0;
                bubble.jitter = 0.0;
                bubble.vx = 0.0;
                bubble.vy = 0.0;
            }
            rig.step(0.0);
            rig.pool.as_slice().iter().map(|b| b.x).collect::<Vec<_>>()
        };
        let first = make();
        assert_eq!(first, make());
        assert!(first[0] > first[1]);
    }

    #[test]
    fn empty_pool_is_a_no_op() {
        let mut grid = OccupancyGrid::new(80.0);
        grid.allocate(100.0, 100.0);
        let noise = Noise::new(&mut StdRng::seed_from_u64(0));
        Integrator::new().step(
            &mut [],
            &mut grid,
            &noise,
            &BubbleConfig::default(),
            100.0,
            100.0,
            0.0,
        );
        assert_eq!(grid.total(), 0.0);
    }

    const W: f32 = 2000.0;
    const H: f32 = 1000.0;

    fn bare(x: f32, y: f32, r: f32) -> Bubble {
        Bubble {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            r,
            r_base: r,
            r_amp: 0.0,
            r_period_factor: 1.0,
            h_base: 200.0,
            s_base: 60.0,
            l_base: 60.0,
            h_jitter_deg: 0.0,
            hue_amp_deg: 0.0,
            hue_period_factor: 1.0,
            color: String::new(),
            jitter: 1.0,
            blur: r * 0.3,
            angle: 0.0,
            aspect: 1.0,
            noise_phase: 0.0,
            home_x: x,
            home_y: y,
        }
    }

    // no flow unless a test asks for it
    fn still() -> BubbleConfig {
        BubbleConfig {
            speed: 0.0,
            radius_min: 20.0,
            radius_max: 200.0,
            ..BubbleConfig::default()
        }
    }

    fn grid() -> OccupancyGrid {
        let mut g = OccupancyGrid::new(80.0);
        g.allocate(W, H);
        g
    }

    fn forces_at(bubbles: &[Bubble], cfg: &BubbleConfig, t: f32) -> Vec<(f32, f32)> {
        let noise = Noise::new(&mut StdRng::seed_from_u64(0));
        let mut integrator = Integrator::new();
        integrator.gather(bubbles, &grid(), &noise, cfg, W, H, t);
        integrator.forces
    }

    fn toward_target(b: &Bubble, t: f32) -> (f32, f32) {
        let (tx, ty) = grid().lowest_occupancy_target(t);
        let (dx, dy) = (tx - b.x, ty - b.y);
        let len = (dx * dx + dy * dy).sqrt();
        (dx / len * COVERAGE_GAIN, dy / len * COVERAGE_GAIN)
    }

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-5 && (a.1 - b.1).abs() < 1e-5
    }

    #[test]
    fn coverage_pulls_at_fixed_strength_toward_target() {
        // a lone bubble at the center feels no centroid pull
        let b = bare(W * 0.5, H * 0.5, 40.0);
        let f = forces_at(std::slice::from_ref(&b), &still(), 0.0)[0];
        assert!(close(f, (COVERAGE_GAIN, 0.0)), "{f:?}");

        for t in [7.0, 30.0, 95.0] {
            let f = forces_at(std::slice::from_ref(&b), &still(), t)[0];
            assert!(close(f, toward_target(&b, t)), "t={t}: {f:?}");
            assert!(((f.0 * f.0 + f.1 * f.1).sqrt() - COVERAGE_GAIN).abs() < 1e-6);
        }
    }

    #[test]
    fn home_tether_accelerates_toward_spawn_point() {
        let cfg = still();
        let mut b = bare(W * 0.5, H * 0.5, 40.0);
        b.home_x += 100.0;
        b.home_y -= 50.0;

        let mut bubbles = [b];
        let mut g = grid();
        let noise = Noise::new(&mut StdRng::seed_from_u64(0));
        Integrator::new().step(&mut bubbles, &mut g, &noise, &cfg, W, H, 0.0);

        let expect_vx = (HOME_GAIN * 100.0 + COVERAGE_GAIN) * DAMPING;
        let expect_vy = HOME_GAIN * -50.0 * DAMPING;
        assert!(close((bubbles[0].vx, bubbles[0].vy), (expect_vx, expect_vy)));
    }

    #[test]
    fn clustered_pool_gets_shared_centroid_kick() {
        let pool = [bare(100.0, 100.0, 40.0), bare(400.0, 100.0, 40.0)];
        let forces = forces_at(&pool, &still(), 0.0);

        let kick = (
            (W * 0.5 - 250.0) / W * CENTROID_GAIN_X,
            (H * 0.5 - 100.0) / H * CENTROID_GAIN_Y,
        );
        assert!(close(kick, (0.09375, 0.06)));
        for (b, f) in pool.iter().zip(forces) {
            let (cx, cy) = toward_target(b, 0.0);
            assert!(close((f.0 - cx, f.1 - cy), kick), "{f:?}");
        }
    }

    #[test]
    fn flow_magnitude_is_speed_times_jitter() {
        let cfg = BubbleConfig {
            speed: 0.25,
            ..still()
        };
        for (k, jitter) in [0.6, 0.8, 1.2].into_iter().enumerate() {
            let mut b = bare(W * 0.5, H * 0.5, 40.0);
            b.jitter = jitter;
            b.noise_phase = k as f32 * 37.0;
            let f = forces_at(std::slice::from_ref(&b), &cfg, 0.0)[0];
            let (fx, fy) = (f.0 - COVERAGE_GAIN, f.1);
            let mag = (fx * fx + fy * fy).sqrt();
            assert!((mag - 0.25 * jitter).abs() < 1e-5, "jitter {jitter}: {mag}");
        }
    }

    #[test]
    fn separation_opens_an_overlapping_pair() {
        let cfg = still();
        let sum = 80.0;
        // both bubbles share one horizontal line with the coverage target,
        // so only separation acts on their distance
        let mut pool = [bare(900.0, H * 0.5, 40.0), bare(940.0, H * 0.5, 40.0)];
        let mut g = grid();
        let noise = Noise::new(&mut StdRng::seed_from_u64(0));
        let mut integrator = Integrator::new();

        let dist = |p: &[Bubble]| ((p[0].x - p[1].x).powi(2) + (p[0].y - p[1].y).powi(2)).sqrt();
        let mut prev = dist(&pool);
        assert!((prev - 0.5 * sum).abs() < 1e-4);

        for _ in 0..40 {
            // tether follows the bubble so it cannot pull the pair back
            for b in pool.iter_mut() {
                b.home_x = b.x;
                b.home_y = b.y;
            }
            integrator.step(&mut pool, &mut g, &noise, &cfg, W, H, 0.0);
            let d = dist(&pool);
            assert!(d >= prev - 1e-4, "distance shrank from {prev} to {d}");
            prev = d;
        }
        assert!(prev >= SPACING * sum, "stalled at {prev}");
    }
}

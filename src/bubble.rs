//! Per-bubble state and the initial spaced-out placement.

use crate::color::{rgb_to_hsl_tuple, tint, Hsl};
use crate::config::BubbleConfig;
use rand::Rng;
use std::f32::consts::{PI, TAU};
use tracing::debug;

/// Wall inset as a fraction of the radius.
pub const EDGE_PAD: f32 = 0.6;
/// Placement spacing as a fraction of the summed radii.
pub const SPACING: f32 = 0.6;

const FALLBACK_HSL: Hsl = Hsl::new(210.0, 60.0, 60.0);

#[derive(Clone, Debug)]
pub struct Bubble {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,

    pub r: f32,
    pub r_base: f32,
    pub r_amp: f32,
    pub r_period_factor: f32,

    pub h_base: f32,
    pub s_base: f32,
    pub l_base: f32,
    pub h_jitter_deg: f32,
    pub hue_amp_deg: f32,
    pub hue_period_factor: f32,

    /// Tinted base color the HSL baseline was derived from.
    pub color: String,
    pub jitter: f32,
    pub blur: f32,
    pub angle: f32,
    pub aspect: f32,
    pub noise_phase: f32,

    pub home_x: f32,
    pub home_y: f32,
}

impl Bubble {
    /// Pulsed radius at simulated time `t`, clamped to the configured bounds.
    pub fn radius_at(&self, t: f32, cfg: &BubbleConfig) -> f32 {
        let period = cfg.radius_pulse_seconds * self.r_period_factor;
        let phase = TAU * t / period + self.noise_phase;
        (self.r_base + self.r_amp * phase.sin()).clamp(cfg.radius_min, cfg.radius_max)
    }

    pub fn hue_at(&self, t: f32, cfg: &BubbleConfig) -> f32 {
        let period = cfg.color_shift_seconds * self.hue_period_factor;
        let phase = TAU * t / period + self.noise_phase;
        self.h_base + self.h_jitter_deg + phase.sin() * self.hue_amp_deg
    }

    pub fn hsl_at(&self, t: f32, cfg: &BubbleConfig) -> Hsl {
        Hsl::new(self.hue_at(t, cfg), self.s_base, self.l_base)
    }

    /// Minimum center distance accepted between two bubbles at placement.
    pub fn spacing(r_a: f32, r_b: f32, floor: f32) -> f32 {
        ((r_a + r_b) * SPACING).max(floor)
    }

    fn spawn<R: Rng + ?Sized>(
        rng: &mut R,
        cfg: &BubbleConfig,
        index: usize,
        x: f32,
        y: f32,
        r: f32,
    ) -> Self {
        let base = &cfg.colors[index % cfg.colors.len()];
        let color = tint(base, rng.gen_range(0.72..=1.18));
        let hsl = rgb_to_hsl_tuple(&color).unwrap_or(FALLBACK_HSL);

        let drift = cfg.speed.max(0.01);

        Self {
            x,
            y,
            vx: rng.gen_range(-drift..=drift),
            vy: rng.gen_range(-drift..=drift),

            r,
            r_base: r,
            r_amp: rng.gen_range(0.4..=1.1) * cfg.radius_pulse_scale * r,
            r_period_factor: rng.gen_range(0.75..=1.35),

            h_base: hsl.h,
            s_base: hsl.s,
            l_base: hsl.l,
            h_jitter_deg: rng.gen_range(-8.0..=8.0),
            hue_amp_deg: rng.gen_range(0.55..=1.25) * cfg.color_shift_degrees,
            hue_period_factor: rng.gen_range(0.75..=1.35),

            color,
            jitter: rng.gen_range(0.6..=1.2),
            blur: rng.gen_range(0.25..=0.45) * r,
            angle: rng.gen_range(0.0..PI),
            aspect: rng.gen_range(0.8..=1.35),
            noise_phase: rng.gen_range(0.0..1000.0),

            home_x: x,
            home_y: y,
        }
    }
}

fn sample_axis<R: Rng + ?Sized>(rng: &mut R, dim: f32, pad: f32) -> f32 {
    if dim - pad > pad {
        rng.gen_range(pad..=dim - pad)
    } else {
        dim * 0.5
    }
}

/// Fixed-size set of bubbles, indexed by position.
#[derive(Clone, Debug, Default)]
pub struct BubblePool {
    bubbles: Vec<Bubble>,
}

impl BubblePool {
    /// Rejection-samples up to `cfg.count` bubbles inside `width × height`.
    ///
    /// Gives up after `cfg.placement_attempts` tries, so a crowded canvas
    /// yields a smaller pool.
    pub fn place<R: Rng + ?Sized>(rng: &mut R, cfg: &BubbleConfig, width: f32, height: f32) -> Self {
        let mut bubbles: Vec<Bubble> = Vec::with_capacity(cfg.count);
        if cfg.count == 0 || width <= 0.0 || height <= 0.0 || cfg.colors.is_empty() {
            return Self { bubbles };
        }

        let mut attempts = 0;
        while bubbles.len() < cfg.count && attempts < cfg.placement_attempts {
            attempts += 1;

            let r = rng.gen_range(cfg.radius_min..=cfg.radius_max);
            let pad = r * EDGE_PAD;
            let x = sample_axis(rng, width, pad);
            let y = sample_axis(rng, height, pad);

            let clear = bubbles.iter().all(|b| {
                let min_d = Bubble::spacing(b.r, r, cfg.min_distance);
                let (dx, dy) = (b.x - x, b.y - y);
                dx * dx + dy * dy >= min_d * min_d
            });

            if clear {
                let index = bubbles.len();
                bubbles.push(Bubble::spawn(rng, cfg, index, x, y, r));
            }
        }

        debug!(
            placed = bubbles.len(),
            requested = cfg.count,
            attempts,
            "bubble placement finished"
        );

        Self { bubbles }
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn as_slice(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Bubble] {
        &mut self.bubbles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bubble> {
        self.bubbles.iter()
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COLORS: [&str; 5] = ["#7dd3fc", "#a78bfa", "#f472b6", "#34d399", "#fbbf24"];

/// Construction parameters for the bubble field.
///
/// Lengths are in logical (CSS-pixel-like) units, periods in seconds.
/// Every field has a default; [`BubbleConfig::sanitized`] repairs values that
/// would otherwise break placement or the frame loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    pub count: usize,
    pub colors: Vec<String>,
    pub radius_min: f32,
    pub radius_max: f32,
    /// Floor for the center spacing accepted at placement time.
    pub min_distance: f32,
    pub speed: f32,
    pub noise_scale: f32,
    pub noise_time_scale: f32,
    pub target_fps: u32,
    pub debug_fps: bool,
    pub start_delay_ms: u64,
    /// The start delay only applies below this display width.
    pub small_viewport_width: f32,
    /// Changing this forces a full pool rebuild.
    pub regeneration_key: u64,
    pub color_shift_seconds: f32,
    pub color_shift_degrees: f32,
    pub radius_pulse_seconds: f32,
    pub radius_pulse_scale: f32,
    pub grid_cell_size: f32,
    pub resize_debounce_ms: u64,
    pub placement_attempts: usize,
    pub seed: Option<u64>,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            count: 10,
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
            radius_min: 80.0,
            radius_max: 180.0,
            min_distance: 140.0,
            speed: 0.25,
            noise_scale: 0.0015,
            noise_time_scale: 0.08,
            target_fps: 30,
            debug_fps: false,
            start_delay_ms: 600,
            small_viewport_width: 768.0,
            regeneration_key: 0,
            color_shift_seconds: 14.0,
            color_shift_degrees: 18.0,
            radius_pulse_seconds: 9.0,
            radius_pulse_scale: 0.08,
            grid_cell_size: 80.0,
            resize_debounce_ms: 1000,
            placement_attempts: 5000,
            seed: None,
        }
    }
}

fn positive_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        fallback
    }
}

fn non_negative_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        fallback
    }
}

impl BubbleConfig {
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();

        self.colors.retain(|c| !c.trim().is_empty());
        if self.colors.is_empty() {
            self.colors = d.colors.clone();
        }

        self.radius_min = positive_or(self.radius_min, d.radius_min);
        self.radius_max = positive_or(self.radius_max, d.radius_max);
        if self.radius_min > self.radius_max {
            std::mem::swap(&mut self.radius_min, &mut self.radius_max);
        }

        self.min_distance = non_negative_or(self.min_distance, d.min_distance);
        self.speed = non_negative_or(self.speed, d.speed);
        self.noise_scale = non_negative_or(self.noise_scale, d.noise_scale);
        self.noise_time_scale = non_negative_or(self.noise_time_scale, d.noise_time_scale);
        self.target_fps = self.target_fps.clamp(1, 240);
        self.small_viewport_width = non_negative_or(self.small_viewport_width, 0.0);
        self.color_shift_seconds = positive_or(self.color_shift_seconds, d.color_shift_seconds);
        self.color_shift_degrees = non_negative_or(self.color_shift_degrees, 0.0);
        self.radius_pulse_seconds = positive_or(self.radius_pulse_seconds, d.radius_pulse_seconds);
        self.radius_pulse_scale = non_negative_or(self.radius_pulse_scale, 0.0);
        self.grid_cell_size = positive_or(self.grid_cell_size, d.grid_cell_size);
        self.placement_attempts = self.placement_attempts.max(1);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

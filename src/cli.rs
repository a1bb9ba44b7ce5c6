use crate::settings::Settings;
use clap::Parser;
use std::path::PathBuf;

/// Drifting soft bubbles, rendered with half-block cells.
#[derive(Parser, Debug)]
#[command(name = "bubblefield", version)]
pub(crate) struct Args {
    /// settings file (defaults to the per-user config dir)
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// number of bubbles
    #[arg(long)]
    pub(crate) count: Option<usize>,

    /// simulation frame-rate cap
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// flow-field speed multiplier
    #[arg(long)]
    pub(crate) speed: Option<f32>,

    /// fixed seed for a repeatable layout
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// canvas pixels per half-block along each axis
    #[arg(long)]
    pub(crate) supersample: Option<u32>,

    /// background color, `#rrggbb` or `rgb(r, g, b)`
    #[arg(long)]
    pub(crate) background: Option<String>,

    /// log measured FPS once per second
    #[arg(long, default_value_t = false)]
    pub(crate) debug_fps: bool,

    /// start with the HUD hidden
    #[arg(long, default_value_t = false)]
    pub(crate) no_hud: bool,

    /// keep animating while the terminal is unfocused
    #[arg(long, default_value_t = false)]
    pub(crate) keep_running_unfocused: bool,

    /// write logs here; nothing is logged otherwise
    #[arg(long)]
    pub(crate) log_file: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    pub(crate) log_level: String,

    /// save the effective settings to the settings file and exit
    #[arg(long, default_value_t = false)]
    pub(crate) write_config: bool,
}

impl Args {
    /// Layers explicit flags over `s`.
    pub(crate) fn apply(&self, s: &mut Settings) {
        if let Some(n) = self.count {
            s.bubbles.count = n;
        }
        if let Some(fps) = self.fps {
            s.bubbles.target_fps = fps;
        }
        if let Some(speed) = self.speed {
            s.bubbles.speed = speed;
        }
        if self.seed.is_some() {
            s.bubbles.seed = self.seed;
        }
        if let Some(ss) = self.supersample {
            s.supersample = ss;
        }
        if let Some(bg) = &self.background {
            s.background = bg.clone();
        }
        if self.debug_fps {
            s.bubbles.debug_fps = true;
        }
        if self.no_hud {
            s.show_hud = false;
        }
        if self.keep_running_unfocused {
            s.pause_on_blur = false;
        }
    }
}

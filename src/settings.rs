use anyhow::{Context, Result};
use bubblefield::color::{parse_color, Rgb};
use bubblefield::BubbleConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const FALLBACK_BACKGROUND: Rgb = Rgb::new(11, 16, 32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) bubbles: BubbleConfig,
    pub(crate) background: String,
    pub(crate) supersample: u32,
    /// How often the terminal is offered a frame.
    pub(crate) vsync_hz: u32,
    pub(crate) pause_on_blur: bool,
    pub(crate) show_hud: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bubbles: BubbleConfig::default(),
            background: "#0b1020".to_string(),
            supersample: 2,
            vsync_hz: 60,
            pause_on_blur: true,
            show_hud: true,
        }
    }
}

impl Settings {
    pub(crate) fn background_rgb(&self) -> Rgb {
        parse_color(&self.background).unwrap_or(FALLBACK_BACKGROUND)
    }

    pub(crate) fn supersample(&self) -> u32 {
        self.supersample.clamp(1, 8)
    }

    pub(crate) fn vsync_hz(&self) -> u32 {
        self.vsync_hz.clamp(10, 240)
    }
}

pub(crate) fn default_settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "bubblefield", "bubblefield")
        .context("could not resolve project directories")?;
    Ok(proj.config_dir().join("settings.json"))
}

/// Missing file means defaults; unreadable or malformed means defaults plus a warning.
pub(crate) fn load_settings(path: &Path) -> Settings {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Settings::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read settings, using defaults");
            return Settings::default();
        }
    };
    match serde_json::from_str::<Settings>(&text) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid settings, using defaults");
            Settings::default()
        }
    }
}

pub(crate) fn save_settings(path: &Path, s: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bubblefield-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("settings.json")
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = scratch("missing");
        let _ = fs::remove_file(&path);
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let path = scratch("malformed");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let path = scratch("saved");
        let mut s = Settings::default();
        s.bubbles.count = 3;
        s.background = "#102030".into();
        s.show_hud = false;
        save_settings(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
        assert_eq!(s.background_rgb(), Rgb::new(16, 32, 48));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = scratch("partial");
        fs::write(&path, r#"{ "supersample": 40, "bubbles": { "count": 2 } }"#).unwrap();
        let s = load_settings(&path);
        assert_eq!(s.bubbles.count, 2);
        assert_eq!(s.supersample(), 8);
        assert_eq!(s.vsync_hz, 60);
    }

    #[test]
    fn bad_background_falls_back() {
        let s = Settings {
            background: "teal".into(),
            ..Settings::default()
        };
        assert_eq!(s.background_rgb(), FALLBACK_BACKGROUND);
    }
}

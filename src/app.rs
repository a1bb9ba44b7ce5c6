use crate::cli::Args;
use crate::settings::{default_settings_path, load_settings, save_settings, Settings};
use crate::term::{Screen, TerminalHost};
use anyhow::Result;
use bubblefield::color::Rgb;
use bubblefield::{FrameLoop, LoopState, Simulation, SystemClock, TickOutcome};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest we block on input before re-checking timers and frames.
const MAX_WAIT: Duration = Duration::from_millis(250);

const HUD_FG: Rgb = Rgb::new(230, 236, 245);

pub(crate) fn run(args: Args) -> Result<()> {
    let path = match &args.config {
        Some(p) => p.clone(),
        None => default_settings_path()?,
    };
    let mut settings = load_settings(&path);
    args.apply(&mut settings);

    if args.write_config {
        save_settings(&path, &settings)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let mut screen = Screen::begin()?;
    let result = App::new(settings, &screen).run(&mut screen);
    // restore the terminal even when the loop failed
    screen.end()?;
    result
}

struct App {
    settings: Settings,
    frame_loop: FrameLoop<TerminalHost, SystemClock>,
    background: Rgb,
    regeneration_key: u64,
    show_hud: bool,
    should_quit: bool,
    dirty: bool,
}

impl App {
    fn new(settings: Settings, screen: &Screen) -> Self {
        let (cols, rows) = screen.size();
        let host = TerminalHost::new(cols, rows, &settings);
        let sim = Simulation::new(settings.bubbles.clone());
        let regeneration_key = sim.regeneration_key();

        Self {
            background: settings.background_rgb(),
            show_hud: settings.show_hud,
            frame_loop: FrameLoop::new(host, SystemClock::default(), sim),
            settings,
            regeneration_key,
            should_quit: false,
            dirty: true,
        }
    }

    fn run(&mut self, screen: &mut Screen) -> Result<()> {
        if !self.frame_loop.start() {
            warn!("terminal has no drawable area, exiting");
            return Ok(());
        }
        info!(
            bubbles = self.frame_loop.simulation().bubbles().len(),
            "bubblefield started"
        );

        let vsync = Duration::from_secs_f32(1.0 / self.settings.vsync_hz() as f32);
        let mut next_vsync = Instant::now();

        while !self.should_quit {
            let now = Instant::now();
            let mut deadline = now + MAX_WAIT;
            if self.frame_loop.host().has_frame() {
                deadline = deadline.min(next_vsync);
            }
            if let Some(t) = self.frame_loop.host().next_deadline() {
                deadline = deadline.min(t);
            }

            // input
            if event::poll(deadline.saturating_duration_since(now))? {
                self.handle_event(event::read()?, screen);
                while event::poll(Duration::ZERO)? {
                    self.handle_event(event::read()?, screen);
                }
            }

            // timers
            let due = self.frame_loop.host_mut().due_timers(Instant::now());
            for t in due {
                if self.frame_loop.on_timer(t) == TickOutcome::Drawn {
                    self.dirty = true;
                }
            }

            // frame
            let now = Instant::now();
            if now >= next_vsync {
                next_vsync += vsync;
                if next_vsync < now {
                    next_vsync = now + vsync;
                }
                if self.frame_loop.host_mut().take_frame().is_some()
                    && self.frame_loop.tick() == TickOutcome::Drawn
                {
                    self.dirty = true;
                }
            }

            if self.dirty {
                self.present(screen)?;
                self.dirty = false;
            }
        }

        self.frame_loop.teardown();
        info!("bubblefield stopped");
        Ok(())
    }

    fn handle_event(&mut self, ev: Event, screen: &mut Screen) {
        match ev {
            Event::Key(k) if k.kind == KeyEventKind::Press => match k.code {
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char(' ') => {
                    let paused = self.frame_loop.host_mut().toggle_pause();
                    info!(paused, "pause toggled");
                    self.dirty = true;
                }
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    self.regeneration_key = self.regeneration_key.wrapping_add(1);
                    self.frame_loop.set_regeneration_key(self.regeneration_key);
                    self.dirty = true;
                }
                KeyCode::Char('h') | KeyCode::Char('H') => {
                    self.show_hud = !self.show_hud;
                    self.dirty = true;
                }
                KeyCode::Char('f') | KeyCode::Char('F') => {
                    let on = !self.frame_loop.debug_fps();
                    self.frame_loop.set_debug_fps(on);
                    info!(on, "fps logging toggled");
                }
                _ => {}
            },
            Event::Resize(cols, rows) => {
                screen.resize(cols, rows);
                if self.frame_loop.host_mut().set_size(cols, rows) {
                    self.frame_loop.notify_resize();
                }
                self.dirty = true;
            }
            Event::FocusGained => self.frame_loop.host_mut().set_focus(true),
            Event::FocusLost => self.frame_loop.host_mut().set_focus(false),
            _ => {}
        }
    }

    fn present(&mut self, screen: &mut Screen) -> Result<()> {
        let host = self.frame_loop.host();
        screen.compose(host.canvas_ref(), host.supersample(), self.background);

        if self.show_hud {
            screen.overlay_text(1, 0, &self.hud_line(), HUD_FG);
        }

        screen.flush()
    }

    fn hud_line(&self) -> String {
        let fl = &self.frame_loop;
        let status = match fl.state() {
            LoopState::Starting => "starting",
            LoopState::Suspended if fl.host().paused() => "paused",
            LoopState::Suspended => "unfocused",
            _ if fl.host().paused() => "paused",
            _ => "running",
        };
        let fps = fl
            .fps()
            .map(|f| format!("{f:.1}"))
            .unwrap_or_else(|| "--".to_string());
        format!(
            " {} bubbles | {} | fps {} | t {:.0}s | [space] pause [r] regen [f] fps log [h] hud [q] quit ",
            fl.simulation().bubbles().len(),
            status,
            fps,
            fl.simulation().time(),
        )
    }
}

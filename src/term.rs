use crate::settings::Settings;
use bubblefield::color::Rgb;
use bubblefield::{Canvas, FrameHandle, Host, ObserverHandle, TimerHandle};
use crossterm::{
    cursor,
    event::{DisableFocusChange, EnableFocusChange},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Logical units covered by one terminal cell.
pub(crate) const CELL_W: f32 = 8.0;
pub(crate) const CELL_H: f32 = 16.0;

const HALF_BLOCK: char = '▀';

/* -----------------------------
   Host: scheduling and canvas ownership
------------------------------ */

pub(crate) struct TerminalHost {
    cols: u16,
    rows: u16,
    supersample: u32,
    canvas: Canvas,

    ids: u64,
    frame: Option<FrameHandle>,
    timers: Vec<(TimerHandle, Instant)>,
    observer: Option<ObserverHandle>,

    paused: bool,
    focused: bool,
    pause_on_blur: bool,
}

impl TerminalHost {
    pub(crate) fn new(cols: u16, rows: u16, settings: &Settings) -> Self {
        Self {
            cols,
            rows,
            supersample: settings.supersample(),
            canvas: Canvas::default(),
            ids: 0,
            frame: None,
            timers: Vec::new(),
            observer: None,
            paused: false,
            focused: true,
            pause_on_blur: settings.pause_on_blur,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.ids += 1;
        self.ids
    }

    /// Records a new terminal size. True when an observer wants to hear about it.
    pub(crate) fn set_size(&mut self, cols: u16, rows: u16) -> bool {
        if cols == self.cols && rows == self.rows {
            return false;
        }
        self.cols = cols;
        self.rows = rows;
        self.observer.is_some()
    }

    pub(crate) fn take_frame(&mut self) -> Option<FrameHandle> {
        self.frame.take()
    }

    pub(crate) fn has_frame(&self) -> bool {
        self.frame.is_some()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub(crate) fn due_timers(&mut self, now: Instant) -> Vec<TimerHandle> {
        let mut due: Vec<(TimerHandle, Instant)> = Vec::new();
        self.timers.retain(|&(h, at)| {
            if at <= now {
                due.push((h, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, at)| at);
        due.into_iter().map(|(h, _)| h).collect()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|&(_, at)| at).min()
    }

    pub(crate) fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub(crate) fn paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub(crate) fn canvas_ref(&self) -> &Canvas {
        &self.canvas
    }

    pub(crate) fn supersample(&self) -> u32 {
        self.supersample
    }
}

impl Host for TerminalHost {
    fn request_frame(&mut self) -> FrameHandle {
        let h = FrameHandle(self.next_id());
        self.frame = Some(h);
        h
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.frame == Some(handle) {
            self.frame = None;
        }
    }

    fn set_timer(&mut self, delay: Duration) -> TimerHandle {
        let h = TimerHandle(self.next_id());
        self.timers.push((h, Instant::now() + delay));
        h
    }

    fn cancel_timer(&mut self, handle: TimerHandle) {
        self.timers.retain(|&(h, _)| h != handle);
    }

    fn observe_resize(&mut self) -> ObserverHandle {
        let h = ObserverHandle(self.next_id());
        self.observer = Some(h);
        h
    }

    fn unobserve_resize(&mut self, handle: ObserverHandle) {
        if self.observer == Some(handle) {
            self.observer = None;
        }
    }

    fn is_visible(&self) -> bool {
        !self.paused && (self.focused || !self.pause_on_blur)
    }

    fn display_size(&self) -> (f32, f32) {
        (self.cols as f32 * CELL_W, self.rows as f32 * CELL_H)
    }

    // half-blocks make each cell two CELL_W-square pixels tall
    fn pixel_ratio(&self) -> f32 {
        self.supersample as f32 / CELL_W
    }

    fn canvas(&mut self) -> Option<&mut Canvas> {
        if self.cols == 0 || self.rows == 0 {
            return None;
        }
        Some(&mut self.canvas)
    }
}

/* -----------------------------
   Screen: diffed half-block output
------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Rgb,
    pub(crate) bg: Rgb,
}

impl Cell {
    fn blank(bg: Rgb) -> Self {
        Self {
            ch: ' ',
            fg: Rgb::new(255, 255, 255),
            bg,
        }
    }
}

fn to_color(c: Rgb) -> Color {
    Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

/// Averages a `ss × ss` canvas block and composites it over `bg`.
///
/// Pixels outside the canvas count as transparent.
pub(crate) fn sample_block(canvas: &Canvas, x0: u32, y0: u32, ss: u32, bg: Rgb) -> Rgb {
    let (mut r, mut g, mut b, mut a) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for y in y0..y0 + ss {
        for x in x0..x0 + ss {
            if let Some(p) = canvas.pixel(x, y) {
                let pa = p.a as f32 / 255.0;
                r += p.r as f32 * pa;
                g += p.g as f32 * pa;
                b += p.b as f32 * pa;
                a += pa;
            }
        }
    }
    let n = (ss * ss).max(1) as f32;
    let (r, g, b, a) = (r / n, g / n, b / n, a / n);
    let over = |src: f32, dst: u8| -> u8 {
        (src + dst as f32 * (1.0 - a)).round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(over(r, bg.r), over(g, bg.g), over(b, bg.b))
}

pub(crate) struct Screen {
    out: io::Stdout,
    cols: u16,
    rows: u16,
    prev: Vec<Cell>,
    next: Vec<Cell>,
    force_full: bool,
}

impl Screen {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            EnableFocusChange,
            Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let mut screen = Self {
            out,
            cols: 0,
            rows: 0,
            prev: Vec::new(),
            next: Vec::new(),
            force_full: true,
        };
        screen.resize(cols, rows);
        Ok(screen)
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            DisableFocusChange,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub(crate) fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        let blank = Cell::blank(Rgb::default());
        let n = cols as usize * rows as usize;
        self.prev = vec![blank; n];
        self.next = vec![blank; n];
        self.force_full = true;
    }

    fn idx(&self, x: u16, y: u16) -> usize {
        y as usize * self.cols as usize + x as usize
    }

    /// Turns the canvas into half-block cells: top pixel in fg, bottom in bg.
    pub(crate) fn compose(&mut self, canvas: &Canvas, ss: u32, bg: Rgb) {
        for y in 0..self.rows {
            for x in 0..self.cols {
                let px = x as u32 * ss;
                let py = y as u32 * 2 * ss;
                let top = sample_block(canvas, px, py, ss, bg);
                let bottom = sample_block(canvas, px, py + ss, ss, bg);
                let i = self.idx(x, y);
                self.next[i] = Cell {
                    ch: HALF_BLOCK,
                    fg: top,
                    bg: bottom,
                };
            }
        }
    }

    /// Writes `text` at row `y`, keeping each cell's lower color as background.
    pub(crate) fn overlay_text(&mut self, x: u16, y: u16, text: &str, fg: Rgb) {
        if y >= self.rows {
            return;
        }
        for (k, ch) in text.chars().enumerate() {
            let cx = x as usize + k;
            if cx >= self.cols as usize {
                break;
            }
            let i = self.idx(cx as u16, y);
            let under = self.next[i];
            self.next[i] = Cell {
                ch,
                fg,
                bg: Rgb::lerp(under.fg, under.bg, 0.5).scale(0.6),
            };
        }
    }

    pub(crate) fn flush(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg: Option<Rgb> = None;
        let mut last_bg: Option<Rgb> = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.idx(x, y);
                let c = self.next[i];
                if !self.force_full && c == self.prev[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(to_color(c.bg)))?;
                    last_bg = Some(c.bg);
                }
                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(to_color(c.fg)))?;
                    last_fg = Some(c.fg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        std::mem::swap(&mut self.prev, &mut self.next);
        self.force_full = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bubblefield::Pixel;

    fn host(cols: u16, rows: u16) -> TerminalHost {
        TerminalHost::new(cols, rows, &Settings::default())
    }

    #[test]
    fn logical_size_and_ratio() {
        let h = host(100, 40);
        assert_eq!(h.display_size(), (800.0, 640.0));
        assert_eq!(h.pixel_ratio(), 0.25);
        // backing store: one canvas pixel per supersample step, two rows per cell
        assert_eq!((800.0 * h.pixel_ratio()) as u32, 100 * 2);
        assert_eq!((640.0 * h.pixel_ratio()) as u32, 40 * 2 * 2);
    }

    #[test]
    fn visibility_follows_pause_and_focus() {
        let mut h = host(10, 10);
        assert!(h.is_visible());
        h.set_focus(false);
        assert!(!h.is_visible());
        h.set_focus(true);
        h.toggle_pause();
        assert!(!h.is_visible());

        let mut s = Settings::default();
        s.pause_on_blur = false;
        let mut h = TerminalHost::new(10, 10, &s);
        h.set_focus(false);
        assert!(h.is_visible());
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut h = host(10, 10);
        let late = h.set_timer(Duration::from_millis(50));
        let early = h.set_timer(Duration::from_millis(10));
        let cancelled = h.set_timer(Duration::from_millis(5));
        h.cancel_timer(cancelled);

        let due = h.due_timers(Instant::now() + Duration::from_secs(1));
        assert_eq!(due, vec![early, late]);
        assert!(h.next_deadline().is_none());
    }

    #[test]
    fn resize_only_reported_while_observed() {
        let mut h = host(10, 10);
        assert!(!h.set_size(20, 10));
        let o = h.observe_resize();
        assert!(h.set_size(30, 10));
        assert!(!h.set_size(30, 10));
        h.unobserve_resize(o);
        assert!(!h.set_size(40, 10));
    }

    #[test]
    fn empty_terminal_has_no_canvas() {
        let mut h = host(0, 24);
        assert!(h.canvas().is_none());
    }

    #[test]
    fn block_sampling_composites_over_background() {
        let mut c = Canvas::new(2, 2);
        let bg = Rgb::new(0, 0, 100);
        assert_eq!(sample_block(&c, 0, 0, 2, bg), bg);

        for y in 0..2 {
            for x in 0..2 {
                c.blend_over(
                    x,
                    y,
                    Pixel {
                        r: 200,
                        g: 0,
                        b: 0,
                        a: 255,
                    },
                );
            }
        }
        assert_eq!(sample_block(&c, 0, 0, 2, bg), Rgb::new(200, 0, 0));

        // half the block lies outside the canvas
        assert_eq!(sample_block(&c, 1, 0, 2, bg), Rgb::new(100, 0, 50));
    }
}

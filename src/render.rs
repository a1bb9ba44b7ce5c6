use crate::bubble::Bubble;
use crate::color::hsl_to_rgb;
use crate::config::BubbleConfig;

pub const BUBBLE_OPACITY: f32 = 0.55;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// RGBA backing store, non-premultiplied, row-major.
#[derive(Clone, Debug, Default)]
pub struct Canvas {
    w: u32,
    h: u32,
    px: Vec<Pixel>,
}

impl Canvas {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }

    /// Reallocates only when the size actually changes.
    pub fn resize(&mut self, w: u32, h: u32) {
        if w == self.w && h == self.h {
            return;
        }
        self.w = w;
        self.h = h;
        self.px.clear();
        self.px.resize((w as usize) * (h as usize), Pixel::default());
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.px[self.idx(x, y)])
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.px
    }

    /// Source-over composite of `src` onto the pixel at `(x, y)`.
    pub fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    if e1 <= e0 {
        return if x < e0 { 0.0 } else { 1.0 };
    }
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Paints bubbles as soft rotated ellipses.
#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer;

impl Renderer {
    /// Draws `bubbles` in order, so later bubbles sit on top.
    ///
    /// `scale` maps logical units to canvas pixels.
    pub fn draw(&self, canvas: &mut Canvas, bubbles: &[Bubble], scale: f32, t: f32, cfg: &BubbleConfig) {
        if canvas.width() == 0 || canvas.height() == 0 || scale <= 0.0 {
            return;
        }
        for b in bubbles {
            self.draw_one(canvas, b, scale, t, cfg);
        }
    }

    fn draw_one(&self, canvas: &mut Canvas, b: &Bubble, scale: f32, t: f32, cfg: &BubbleConfig) {
        let rgb = hsl_to_rgb(b.hsl_at(t, cfg));
        let r = b.radius_at(t, cfg) * scale;

        let cx = b.x * scale;
        let cy = b.y * scale;
        let rx = (b.aspect * r).max(0.5);
        let ry = r.max(0.5);
        let feather = (b.blur * scale).max(0.5);

        let (sin, cos) = b.angle.sin_cos();
        let reach = rx.max(ry) + feather;

        let x0 = (cx - reach).floor().max(0.0) as i32;
        let y0 = (cy - reach).floor().max(0.0) as i32;
        let x1 = ((cx + reach).ceil() as i64).min(canvas.width() as i64 - 1) as i32;
        let y1 = ((cy + reach).ceil() as i64).min(canvas.height() as i64 - 1) as i32;

        let inner = rx.min(ry);

        for py in y0..=y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..=x1 {
                let dx = px as f32 + 0.5 - cx;

                let lx = dx * cos + dy * sin;
                let ly = -dx * sin + dy * cos;
                let q = ((lx / rx).powi(2) + (ly / ry).powi(2)).sqrt();
                let dist = (q - 1.0) * inner;

                let coverage = 1.0 - smoothstep(-feather, feather, dist);
                if coverage <= 0.0 {
                    continue;
                }

                let a = (coverage * BUBBLE_OPACITY * 255.0 + 0.5) as u8;
                if a == 0 {
                    continue;
                }
                canvas.blend_over(
                    px,
                    py,
                    Pixel {
                        r: rgb.r,
                        g: rgb.g,
                        b: rgb.b,
                        a,
                    },
                );
            }
        }
    }
}

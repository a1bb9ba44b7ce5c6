//! 2D simplex noise over a shuffled permutation table.

use rand::{seq::SliceRandom, Rng};

const F2: f32 = 0.366_025_42; // 0.5 * (sqrt(3) - 1)
const G2: f32 = 0.211_324_87; // (3 - sqrt(3)) / 6

const GRAD: [(f32, f32); 12] = [
    (1.0, 1.0),
    (-1.0, 1.0),
    (1.0, -1.0),
    (-1.0, -1.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (0.0, 1.0),
    (0.0, -1.0),
];

/// Smooth scalar field in `-1..=1`.
///
/// The table is shuffled once from the supplied RNG, so two generators built
/// from different seeds diverge while one generator is stable across calls.
#[derive(Clone)]
pub struct Noise {
    perm: [u8; 512],
}

impl Noise {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut base: Vec<u8> = (0..=255u8).collect();
        base.shuffle(rng);

        let mut perm = [0u8; 512];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = base[i & 255];
        }
        Self { perm }
    }

    fn gradient_index(&self, i: usize, j: usize) -> usize {
        self.perm[i + self.perm[j] as usize] as usize % GRAD.len()
    }

    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let s = (x + y) * F2;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let t = (i + j) * G2;

        let x0 = x - (i - t);
        let y0 = y - (j - t);

        let (i1, j1) = if x0 > y0 { (1usize, 0usize) } else { (0, 1) };

        let x1 = x0 - i1 as f32 + G2;
        let y1 = y0 - j1 as f32 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;

        let corner = |gi: usize, dx: f32, dy: f32| -> f32 {
            let t = 0.5 - dx * dx - dy * dy;
            if t < 0.0 {
                0.0
            } else {
                let (gx, gy) = GRAD[gi];
                let t2 = t * t;
                t2 * t2 * (gx * dx + gy * dy)
            }
        };

        let n0 = corner(self.gradient_index(ii, jj), x0, y0);
        let n1 = corner(self.gradient_index(ii + i1, jj + j1), x1, y1);
        let n2 = corner(self.gradient_index(ii + 1, jj + 1), x2, y2);

        (70.0 * (n0 + n1 + n2)).clamp(-1.0, 1.0)
    }
}

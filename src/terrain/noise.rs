//! Seeded 2D simplex noise with fractal octave summation.

use crate::config::NoiseLayerConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const F2: f64 = 0.366_025_403_784_438_6; // (sqrt(3) - 1) / 2
const G2: f64 = 0.211_324_865_405_187_1; // (3 - sqrt(3)) / 6

const GRAD2: [[f64; 2]; 12] = [
    [1.0, 1.0], [-1.0, 1.0], [1.0, -1.0], [-1.0, -1.0],
    [1.0, 0.0], [-1.0, 0.0], [1.0, 0.0], [-1.0, 0.0],
    [0.0, 1.0], [0.0, -1.0], [0.0, 1.0], [0.0, -1.0],
];

/// 2D simplex noise over a seeded permutation table.
#[derive(Clone)]
pub struct SimplexNoise {
    perm: [u8; 512],
}

impl SimplexNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut table: Vec<u8> = (0..=255).collect();

        // Fisher-Yates
        for i in (1..256).rev() {
            let j = rng.gen_range(0..=i);
            table.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }

        Self { perm }
    }

    /// Sample noise at (x, y). Output lies in [-1, 1].
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let s = (x + y) * F2;
        let i = (x + s).floor() as i64;
        let j = (y + s).floor() as i64;

        let t = (i + j) as f64 * G2;
        let x0 = x - (i as f64 - t);
        let y0 = y - (j as f64 - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f64 + G2;
        let y1 = y0 - j1 as f64 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = i.rem_euclid(256) as usize;
        let jj = j.rem_euclid(256) as usize;

        let gi0 = self.perm[ii + self.perm[jj] as usize] as usize % 12;
        let gi1 = self.perm[ii + i1 + self.perm[jj + j1] as usize] as usize % 12;
        let gi2 = self.perm[ii + 1 + self.perm[jj + 1] as usize] as usize % 12;

        let n = Self::corner(x0, y0, gi0) + Self::corner(x1, y1, gi1) + Self::corner(x2, y2, gi2);
        (70.0 * n).clamp(-1.0, 1.0)
    }

    #[inline]
    fn corner(x: f64, y: f64, gi: usize) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let t = t * t;
            t * t * (GRAD2[gi][0] * x + GRAD2[gi][1] * y)
        }
    }

    /// Fractal Brownian motion, normalized back to [-1, 1].
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves.max(1) {
            value += amplitude * self.sample(x * frequency, y * frequency);
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        value / max_value
    }
}

/// A noise generator bound to one layer's frequency and octave settings.
#[derive(Clone)]
pub struct NoiseLayer {
    noise: SimplexNoise,
    pub frequency: f64,
    pub amplitude: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
}

impl NoiseLayer {
    pub fn new(seed: u64, config: &NoiseLayerConfig) -> Self {
        Self {
            noise: SimplexNoise::new(seed),
            frequency: config.frequency,
            amplitude: config.amplitude,
            octaves: config.octaves,
            persistence: config.persistence,
            lacunarity: config.lacunarity,
        }
    }

    /// Weighted layer value in [-amplitude, amplitude]
    #[inline]
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        self.amplitude
            * self.noise.fbm(
                x * self.frequency,
                z * self.frequency,
                self.octaves,
                self.persistence,
                self.lacunarity,
            )
    }
}

//! Chunked, memoized terrain elevation over an unbounded plane.
//!
//! Each chunk stores `(chunk_size + 1)^2` samples taken at global integer
//! lattice points, so neighbouring chunks share their common edge exactly.
//! Samples are normalized with a fixed scale rather than per-chunk
//! min/max, which keeps `height(x, z)` continuous across chunk seams.

use super::biome::Biome;
use super::noise::NoiseLayer;
use crate::config::{NoiseLayerConfig, TerrainConfig};
use crate::error::TerrainError;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Integer chunk coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Immutable grid of normalized elevations in [0, 1]
#[derive(Clone, Debug)]
pub struct HeightChunk {
    pub coord: ChunkCoord,
    /// Cells per side; the grid holds `size + 1` samples per side
    pub size: usize,
    samples: Vec<f32>,
}

impl HeightChunk {
    #[inline]
    pub fn sample(&self, local_x: usize, local_z: usize) -> f32 {
        self.samples[local_z * (self.size + 1) + local_x]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Three blended noise layers plus the flattening curve
struct HeightGenerator {
    mountains: NoiseLayer,
    hills: NoiseLayer,
    detail: NoiseLayer,
    amplitude_sum: f64,
    flatten_exponent: f32,
}

impl HeightGenerator {
    fn normalized(&self, x: f64, z: f64) -> f32 {
        let blended = self.mountains.sample(x, z) + self.hills.sample(x, z) + self.detail.sample(x, z);
        let unit = ((blended / self.amplitude_sum + 1.0) * 0.5).clamp(0.0, 1.0) as f32;
        unit.powf(self.flatten_exponent)
    }

    fn chunk(&self, coord: ChunkCoord, size: usize) -> HeightChunk {
        let side = size + 1;
        let origin_x = coord.x as i64 * size as i64;
        let origin_z = coord.z as i64 * size as i64;
        let mut samples = Vec::with_capacity(side * side);
        for lz in 0..side {
            for lx in 0..side {
                let gx = (origin_x + lx as i64) as f64;
                let gz = (origin_z + lz as i64) as f64;
                samples.push(self.normalized(gx, gz));
            }
        }
        HeightChunk { coord, size, samples }
    }
}

/// Deterministic terrain elevation with a per-instance chunk cache.
///
/// The cache is read-many/write-once per key: a missing chunk is computed
/// outside the lock and published with first-writer-wins, which is safe
/// because chunk generation is a pure function of seed and coordinate.
pub struct HeightField {
    seed: u64,
    chunk_size: usize,
    max_height: f32,
    generator: HeightGenerator,
    chunks: RwLock<HashMap<ChunkCoord, Arc<HeightChunk>>>,
}

fn check_layer(name: &'static str, layer: &NoiseLayerConfig) -> Result<(), TerrainError> {
    let invalid = |field: &'static str, value: f64| TerrainError::InvalidLayer {
        layer: name,
        field,
        value,
    };
    if !(layer.frequency.is_finite() && layer.frequency > 0.0) {
        return Err(invalid("frequency", layer.frequency));
    }
    if !(layer.amplitude.is_finite() && layer.amplitude >= 0.0) {
        return Err(invalid("amplitude", layer.amplitude));
    }
    if layer.octaves == 0 {
        return Err(invalid("octaves", 0.0));
    }
    if !(layer.persistence.is_finite() && layer.persistence > 0.0) {
        return Err(invalid("persistence", layer.persistence));
    }
    if !(layer.lacunarity.is_finite() && layer.lacunarity >= 1.0) {
        return Err(invalid("lacunarity", layer.lacunarity));
    }
    Ok(())
}

impl HeightField {
    /// Build a height field. Invalid parameters are fatal here, before any
    /// entity is placed on the terrain.
    pub fn new(config: &TerrainConfig, seed: u64) -> Result<Self, TerrainError> {
        if config.chunk_size < 2 {
            return Err(TerrainError::ChunkTooSmall(config.chunk_size));
        }
        if !(config.max_height.is_finite() && config.max_height > 0.0) {
            return Err(TerrainError::InvalidMaxHeight(config.max_height));
        }
        if !(config.flatten_exponent.is_finite() && config.flatten_exponent > 0.0) {
            return Err(TerrainError::InvalidFlatten(config.flatten_exponent));
        }
        check_layer("mountains", &config.mountains)?;
        check_layer("hills", &config.hills)?;
        check_layer("detail", &config.detail)?;

        let amplitude_sum =
            config.mountains.amplitude + config.hills.amplitude + config.detail.amplitude;
        if amplitude_sum <= 0.0 {
            return Err(TerrainError::ZeroAmplitude);
        }

        let generator = HeightGenerator {
            mountains: NoiseLayer::new(seed, &config.mountains),
            hills: NoiseLayer::new(seed.wrapping_add(1), &config.hills),
            detail: NoiseLayer::new(seed.wrapping_add(2), &config.detail),
            amplitude_sum,
            flatten_exponent: config.flatten_exponent,
        };

        Ok(Self {
            seed,
            chunk_size: config.chunk_size,
            max_height: config.max_height,
            generator,
            chunks: RwLock::new(HashMap::new()),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    /// Chunk containing world point (x, z)
    #[inline]
    pub fn chunk_coord(&self, x: f64, z: f64) -> ChunkCoord {
        let size = self.chunk_size as f64;
        ChunkCoord::new((x / size).floor() as i32, (z / size).floor() as i32)
    }

    /// Fetch a chunk, generating and caching it on first access
    pub fn chunk(&self, coord: ChunkCoord) -> Arc<HeightChunk> {
        {
            let cache = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(chunk) = cache.get(&coord) {
                return Arc::clone(chunk);
            }
        }

        let generated = Arc::new(self.generator.chunk(coord, self.chunk_size));
        let mut cache = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(coord).or_insert(generated))
    }

    /// Generate every chunk in the inclusive rectangle in parallel.
    /// Returns the number of chunks newly published.
    pub fn prefetch(&self, min: ChunkCoord, max: ChunkCoord) -> usize {
        let missing: Vec<ChunkCoord> = {
            let cache = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
            (min.z..=max.z)
                .flat_map(|z| (min.x..=max.x).map(move |x| ChunkCoord::new(x, z)))
                .filter(|coord| !cache.contains_key(coord))
                .collect()
        };

        let generated: Vec<HeightChunk> = missing
            .par_iter()
            .map(|&coord| self.generator.chunk(coord, self.chunk_size))
            .collect();

        let mut cache = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        let mut published = 0;
        for chunk in generated {
            if let std::collections::hash_map::Entry::Vacant(slot) = cache.entry(chunk.coord) {
                slot.insert(Arc::new(chunk));
                published += 1;
            }
        }
        published
    }

    /// Number of chunks currently cached
    pub fn cached_chunks(&self) -> usize {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Bilinearly interpolated normalized height in [0, 1]
    pub fn normalized_height(&self, x: f32, z: f32) -> f32 {
        let (x, z) = (x as f64, z as f64);
        let size = self.chunk_size as f64;
        let coord = self.chunk_coord(x, z);
        let chunk = self.chunk(coord);

        let local_x = (x - coord.x as f64 * size).clamp(0.0, size);
        let local_z = (z - coord.z as f64 * size).clamp(0.0, size);
        let x0 = (local_x.floor() as usize).min(self.chunk_size - 1);
        let z0 = (local_z.floor() as usize).min(self.chunk_size - 1);
        let fx = (local_x - x0 as f64).clamp(0.0, 1.0) as f32;
        let fz = (local_z - z0 as f64).clamp(0.0, 1.0) as f32;

        let h00 = chunk.sample(x0, z0);
        let h10 = chunk.sample(x0 + 1, z0);
        let h01 = chunk.sample(x0, z0 + 1);
        let h11 = chunk.sample(x0 + 1, z0 + 1);

        let near = h00 * (1.0 - fx) + h10 * fx;
        let far = h01 * (1.0 - fx) + h11 * fx;
        (near * (1.0 - fz) + far * fz).clamp(0.0, 1.0)
    }

    /// World height in [0, max_height]
    #[inline]
    pub fn height(&self, x: f32, z: f32) -> f32 {
        self.normalized_height(x, z) * self.max_height
    }

    pub fn biome_at(&self, x: f32, z: f32, thresholds: &super::BiomeThresholds) -> Biome {
        Biome::from_normalized(self.normalized_height(x, z), thresholds)
    }
}

impl fmt::Debug for HeightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeightField")
            .field("seed", &self.seed)
            .field("chunk_size", &self.chunk_size)
            .field("max_height", &self.max_height)
            .field("cached_chunks", &self.cached_chunks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(seed: u64) -> HeightField {
        HeightField::new(&TerrainConfig::default(), seed).unwrap()
    }

    #[test]
    fn test_height_deterministic_and_idempotent() {
        let a = field(42);
        let b = field(42);
        for i in 0..100 {
            let x = i as f32 * 3.7 - 150.0;
            let z = i as f32 * -2.3 + 40.0;
            let first = a.height(x, z);
            assert_eq!(first, a.height(x, z));
            assert_eq!(first, b.height(x, z));
        }
    }

    #[test]
    fn test_height_within_bounds() {
        let terrain = field(7);
        for i in 0..400 {
            let x = (i % 20) as f32 * 13.1 - 130.0;
            let z = (i / 20) as f32 * 11.7 - 110.0;
            let h = terrain.height(x, z);
            assert!(h >= 0.0 && h <= terrain.max_height());
        }
    }

    #[test]
    fn test_no_seams_across_chunk_boundaries() {
        let terrain = field(42);
        let size = terrain.chunk_size() as f32;
        let bound = terrain.max_height() * 0.15;
        let step = 0.25f32;

        for boundary in [-2.0 * size, -size, 0.0, size, 2.0 * size] {
            for row in 0..8 {
                let z = row as f32 * 9.3 - 30.0;
                let mut x = boundary - 2.0;
                while x < boundary + 2.0 {
                    let diff = (terrain.height(x + step, z) - terrain.height(x, z)).abs();
                    assert!(diff < bound * step.max(1.0), "gap at x={x} z={z}: {diff}");
                    x += step;
                }
                let left = terrain.height(boundary - 1e-3, z);
                let right = terrain.height(boundary + 1e-3, z);
                assert!((left - right).abs() < 0.05, "seam at x={boundary}");

                let below = terrain.height(z, boundary - 1e-3);
                let above = terrain.height(z, boundary + 1e-3);
                assert!((below - above).abs() < 0.05, "seam at z={boundary}");
            }
        }
    }

    #[test]
    fn test_interpolation_hits_lattice_samples() {
        let terrain = field(3);
        let chunk = terrain.chunk(ChunkCoord::new(0, 0));
        let expected = chunk.sample(5, 9) * terrain.max_height();
        assert!((terrain.height(5.0, 9.0) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_shared_edges_match() {
        let terrain = field(11);
        let size = terrain.chunk_size();
        let left = terrain.chunk(ChunkCoord::new(-1, 0));
        let right = terrain.chunk(ChunkCoord::new(0, 0));
        for z in 0..=size {
            assert_eq!(left.sample(size, z), right.sample(0, z));
        }
    }

    #[test]
    fn test_chunks_memoized() {
        let terrain = field(5);
        assert_eq!(terrain.cached_chunks(), 0);
        let first = terrain.chunk(ChunkCoord::new(2, -3));
        let second = terrain.chunk(ChunkCoord::new(2, -3));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(terrain.cached_chunks(), 1);
    }

    #[test]
    fn test_prefetch_publishes_once() {
        let terrain = field(5);
        terrain.chunk(ChunkCoord::new(0, 0));
        let published = terrain.prefetch(ChunkCoord::new(-1, -1), ChunkCoord::new(1, 1));
        assert_eq!(published, 8);
        assert_eq!(terrain.cached_chunks(), 9);
        assert_eq!(terrain.prefetch(ChunkCoord::new(-1, -1), ChunkCoord::new(1, 1)), 0);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = TerrainConfig::default();
        config.chunk_size = 1;
        assert_eq!(HeightField::new(&config, 1).unwrap_err(), TerrainError::ChunkTooSmall(1));

        let mut config = TerrainConfig::default();
        config.max_height = f32::NAN;
        assert!(matches!(
            HeightField::new(&config, 1),
            Err(TerrainError::InvalidMaxHeight(_))
        ));

        let mut config = TerrainConfig::default();
        config.mountains.amplitude = 0.0;
        config.hills.amplitude = 0.0;
        config.detail.amplitude = 0.0;
        assert_eq!(HeightField::new(&config, 1).unwrap_err(), TerrainError::ZeroAmplitude);
    }
}

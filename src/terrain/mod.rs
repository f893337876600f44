//! Procedural terrain.
//!
//! This module contains:
//! - Seeded simplex noise layers
//! - The chunked height field with bilinear sampling
//! - Biome classification by normalized height

pub mod biome;
pub mod heightfield;
pub mod noise;

pub use biome::{Biome, BiomeThresholds};
pub use heightfield::{ChunkCoord, HeightChunk, HeightField};
pub use noise::{NoiseLayer, SimplexNoise};

//! Biome classification from normalized terrain height.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Surface category of a terrain point, ordered from lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    Water,
    Sand,
    Dirt,
    Grass,
    Hill,
    Mountain,
    Snow,
}

impl Biome {
    /// Map a normalized height in [0, 1] to a biome using ascending upper
    /// bounds. Pure function of its inputs.
    pub fn from_normalized(height: f32, thresholds: &BiomeThresholds) -> Biome {
        if height < thresholds.water {
            Biome::Water
        } else if height < thresholds.sand {
            Biome::Sand
        } else if height < thresholds.dirt {
            Biome::Dirt
        } else if height < thresholds.grass {
            Biome::Grass
        } else if height < thresholds.hill {
            Biome::Hill
        } else if height < thresholds.mountain {
            Biome::Mountain
        } else {
            Biome::Snow
        }
    }

    /// Walkable, dry ground
    pub fn is_land(&self) -> bool {
        !matches!(self, Biome::Water)
    }

    /// Ground fruit trees can take root in
    pub fn supports_flora(&self) -> bool {
        matches!(self, Biome::Dirt | Biome::Grass | Biome::Hill)
    }

    /// Map glyph for terminal output
    pub fn glyph(&self) -> char {
        match self {
            Biome::Water => '~',
            Biome::Sand => '.',
            Biome::Dirt => ',',
            Biome::Grass => '"',
            Biome::Hill => 'n',
            Biome::Mountain => '^',
            Biome::Snow => '*',
        }
    }
}

/// Upper bounds of each biome band. Snow covers everything above `mountain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomeThresholds {
    pub water: f32,
    pub sand: f32,
    pub dirt: f32,
    pub grass: f32,
    pub hill: f32,
    pub mountain: f32,
}

impl Default for BiomeThresholds {
    fn default() -> Self {
        Self {
            water: 0.25,
            sand: 0.3,
            dirt: 0.4,
            grass: 0.6,
            hill: 0.75,
            mountain: 0.88,
        }
    }
}

impl BiomeThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = [self.water, self.sand, self.dirt, self.grass, self.hill, self.mountain];
        let ascending = bounds.windows(2).all(|w| w[0] < w[1]);
        let in_range = bounds.iter().all(|b| (0.0..=1.0).contains(b));
        if ascending && in_range {
            Ok(())
        } else {
            Err(ConfigError::Invalid(
                "terrain.biomes thresholds must be strictly ascending within [0, 1]".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biome_bands_ascend() {
        let t = BiomeThresholds::default();
        let samples = [0.0, 0.27, 0.35, 0.5, 0.7, 0.8, 1.0];
        let biomes: Vec<Biome> = samples.iter().map(|&h| Biome::from_normalized(h, &t)).collect();
        assert_eq!(
            biomes,
            vec![
                Biome::Water,
                Biome::Sand,
                Biome::Dirt,
                Biome::Grass,
                Biome::Hill,
                Biome::Mountain,
                Biome::Snow
            ]
        );
        assert!(biomes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_threshold_boundaries_are_exclusive() {
        let t = BiomeThresholds::default();
        assert_eq!(Biome::from_normalized(t.water, &t), Biome::Sand);
        assert_eq!(Biome::from_normalized(t.mountain, &t), Biome::Snow);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let t = BiomeThresholds {
            grass: 0.3,
            ..BiomeThresholds::default()
        };
        assert!(t.validate().is_err());
    }
}

use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};

use super::*;

/// Seeded generator used for real rounds and deterministic tests.
#[derive(Clone, Debug)]
pub struct RandomTileGenerator {
    rng: SmallRng,
}

impl RandomTileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl TileGenerator for RandomTileGenerator {
    fn roll(&mut self, palette: &LevelPalette) -> (TileColor, TilePattern) {
        let color = if palette.colors.is_empty() {
            log::warn!("Palette has no colors, fallback to red");
            TileColor::Red
        } else {
            palette.colors[self.rng.random_range(0..palette.colors.len())]
        };

        let total = palette.total_pattern_weight();
        if total == 0 {
            log::warn!("Palette has no pattern weight, fallback to flat");
            return (color, TilePattern::Flat);
        }

        let mut roll = self.rng.random_range(0..total);
        for &(pattern, weight) in &palette.patterns {
            if roll < weight {
                return (color, pattern);
            }
            roll -= weight;
        }

        // weights sum to `total`, the walk above always returns
        (color, TilePattern::Flat)
    }
}

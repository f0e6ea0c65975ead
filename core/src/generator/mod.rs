use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::tile::{TileColor, TilePattern};

pub use random::*;

mod random;

/// Source of fresh tiles for board initialization and refill.
pub trait TileGenerator {
    fn roll(&mut self, palette: &LevelPalette) -> (TileColor, TilePattern);
}

/// The color/pattern pool a level draws from. Colors are picked uniformly;
/// patterns by integer weight. The concrete table is configuration, carried
/// as data so hosts can override it wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelPalette {
    pub colors: SmallVec<[TileColor; 6]>,
    pub patterns: SmallVec<[(TilePattern, u32); 5]>,
}

impl LevelPalette {
    /// Default progression: early levels stay flat, decorated patterns unlock
    /// one per level, star tiles stay rare throughout.
    pub fn for_level(level: u32) -> Self {
        use TilePattern::*;

        let colors = SmallVec::from_slice(&TileColor::ALL);
        let mut patterns: SmallVec<[(TilePattern, u32); 5]> = SmallVec::new();
        patterns.push((Flat, 12));
        if level >= 2 {
            patterns.push((Cross, 3));
            patterns.push((Star, 1));
        }
        if level >= 3 {
            patterns.push((Circle, 3));
        }
        if level >= 4 {
            patterns.push((Triangle, 3));
        }
        Self { colors, patterns }
    }

    pub fn total_pattern_weight(&self) -> u32 {
        self.patterns.iter().map(|&(_, weight)| weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_one_is_flat_only() {
        let palette = LevelPalette::for_level(1);
        assert_eq!(palette.patterns.as_slice(), &[(TilePattern::Flat, 12)]);
        assert_eq!(palette.colors.len(), 6);
    }

    #[test]
    fn stars_unlock_at_level_two_and_stay_rare() {
        let palette = LevelPalette::for_level(2);
        let star_weight = palette
            .patterns
            .iter()
            .find(|(pattern, _)| *pattern == TilePattern::Star)
            .map(|&(_, weight)| weight);
        assert_eq!(star_weight, Some(1));
        assert!(palette.total_pattern_weight() > 8);
    }

    #[test]
    fn later_levels_grow_the_pattern_pool() {
        assert!(LevelPalette::for_level(4).patterns.len() > LevelPalette::for_level(2).patterns.len());
    }
}

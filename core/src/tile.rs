use serde::{Deserialize, Serialize};

use crate::types::Coord2;

/// Matching key of a tile. Runs are detected on color alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl TileColor {
    pub const ALL: [TileColor; 6] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Blue,
        Self::Purple,
    ];
}

/// Visual variant of a tile. Never affects match eligibility, only score weight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TilePattern {
    Flat,
    Cross,
    Circle,
    Triangle,
    Star,
}

impl TilePattern {
    /// Star tiles are worth the bonus score weight.
    pub const fn is_bonus(self) -> bool {
        matches!(self, Self::Star)
    }
}

impl Default for TilePattern {
    fn default() -> Self {
        Self::Flat
    }
}

/// Stable identity of a tile for the lifetime of a board. Tween requests
/// address tiles by id, so identity survives any number of grid moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    /// Grid cell this tile rests in. Equal to its index in the owning grid
    /// after every committed mutation.
    pub pos: Coord2,
    pub color: TileColor,
    pub pattern: TilePattern,
}

impl Tile {
    /// Edge length of a tile in pixels.
    pub const SIZE: u16 = 32;

    pub const fn new(id: TileId, pos: Coord2, color: TileColor, pattern: TilePattern) -> Self {
        Self {
            id,
            pos,
            color,
            pattern,
        }
    }

    /// Render position of this tile at rest.
    pub fn pixel_pos(&self) -> (u16, u16) {
        pixel_of(self.pos)
    }
}

/// Render position of a cell; tween destinations are computed from this.
pub fn pixel_of((x, y): Coord2) -> (u16, u16) {
    (u16::from(x) * Tile::SIZE, u16::from(y) * Tile::SIZE)
}

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{GameError, Result};
use crate::generator::{LevelPalette, TileGenerator};
use crate::tile::{Tile, TileColor, TileId, TilePattern};
use crate::types::{manhattan, mult, CellCount, Coord2, ToNdIndex};

/// Minimum length of a scoring run.
pub const MIN_RUN: usize = 3;

/// Reroll budget for degenerate palettes that cannot produce a matchless board.
const MAX_GENERATE_ATTEMPTS: u32 = 100;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchAxis {
    Row,
    Column,
}

/// A maximal run of same-colored cells along one axis. A cell that sits in
/// both a row run and a column run appears in both; dedup happens in
/// [`Board::matched_cells`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRun {
    pub axis: MatchAxis,
    pub color: TileColor,
    pub cells: SmallVec<[Coord2; 8]>,
}

impl MatchRun {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// One tile relocation of a fall plan: computed first, animated by the host,
/// then committed through [`Board::apply_moves`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMove {
    pub id: TileId,
    pub from: Coord2,
    pub to: Coord2,
}

/// One freshly rolled tile of a refill plan, committed per-tile through
/// [`Board::place_spawn`] once its drop-in tween settles.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileSpawn {
    pub tile: Tile,
    pub to: Coord2,
}

/// The grid of tiles and the matching engine over it.
///
/// The board exclusively owns its tiles. At rest, between player turns,
/// `matches` is empty and every tile's `pos` equals its grid index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    grid: Array2<Option<Tile>>,
    matches: Vec<MatchRun>,
    level: u32,
    next_tile_id: u32,
}

impl Board {
    /// Rolls a full board for `level`, rerolling until a detection pass finds
    /// nothing, so play always starts at rest.
    pub fn generate(size: Coord2, level: u32, generator: &mut impl TileGenerator) -> Self {
        let size = (size.0.max(1), size.1.max(1));
        let palette = LevelPalette::for_level(level);
        let mut board = Self {
            grid: Array2::default(size.to_nd_index()),
            matches: Vec::new(),
            level,
            next_tile_id: 0,
        };

        let (width, height) = size;
        let mut attempts = 0;
        loop {
            for x in 0..width {
                for y in 0..height {
                    let tile = board.fresh_tile((x, y), generator, &palette);
                    board.grid[(x, y).to_nd_index()] = Some(tile);
                }
            }
            if board.calculate_matches().is_empty() {
                break;
            }
            attempts += 1;
            if attempts >= MAX_GENERATE_ATTEMPTS {
                log::warn!(
                    "Could not roll a matchless board in {} attempts, keeping the last one",
                    attempts
                );
                break;
            }
            log::debug!(
                "Starting board has {} matches, rerolling (attempt {})",
                board.matches.len(),
                attempts
            );
            board.matches.clear();
        }
        board
    }

    /// Builds a board from explicit row-major cell specs. Rows must be
    /// non-empty and of equal width.
    pub fn from_rows(level: u32, rows: &[&[(TileColor, TilePattern)]]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        if height == 0 || width == 0 || height > usize::from(u8::MAX) || width > usize::from(u8::MAX)
        {
            return Err(GameError::InvalidBoardShape);
        }
        if rows.iter().any(|row| row.len() != width) {
            return Err(GameError::InvalidBoardShape);
        }

        let mut board = Self {
            grid: Array2::default([width, height]),
            matches: Vec::new(),
            level,
            next_tile_id: 0,
        };
        for (y, row) in rows.iter().enumerate() {
            for (x, &(color, pattern)) in row.iter().enumerate() {
                let pos = (x as u8, y as u8);
                let id = board.take_tile_id();
                board.grid[pos.to_nd_index()] = Some(Tile::new(id, pos, color, pattern));
            }
        }
        Ok(board)
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.grid.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn total_cells(&self) -> CellCount {
        let (width, height) = self.size();
        mult(width, height)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn tile_at(&self, coords: Coord2) -> Option<&Tile> {
        self.grid.get(coords.to_nd_index()).and_then(|cell| cell.as_ref())
    }

    pub fn iter_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.grid.iter().flatten()
    }

    pub fn matches(&self) -> &[MatchRun] {
        &self.matches
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    /// Scans the whole grid and records every maximal run of at least
    /// [`MIN_RUN`] same-colored cells, rows first, then columns. Read-only
    /// with respect to the grid and deterministic.
    pub fn calculate_matches(&mut self) -> &[MatchRun] {
        self.matches.clear();
        let (width, height) = self.size();
        for y in 0..height {
            self.scan_line(MatchAxis::Row, (0..width).map(|x| (x, y)));
        }
        for x in 0..width {
            self.scan_line(MatchAxis::Column, (0..height).map(|y| (x, y)));
        }
        &self.matches
    }

    /// Deduplicated union of all matched cells: a tile that sits in both a
    /// row run and a column run scores and is removed exactly once.
    pub fn matched_cells(&self) -> BTreeSet<Coord2> {
        self.matches
            .iter()
            .flat_map(|run| run.cells.iter().copied())
            .collect()
    }

    /// Pure lookahead: would swapping the two adjacent cells produce a match?
    ///
    /// The swap happens in the grid, detection runs, and the grid is restored
    /// bit-for-bit with `matches` left empty before returning. Tile coordinate
    /// fields are never touched: detection reads colors from grid slots, so
    /// they cannot influence the result. Both the swap legality gate and the
    /// hint search rely on this being unobservable.
    pub fn would_match(&mut self, a: Coord2, b: Coord2) -> Result<bool> {
        let (a, b) = self.check_swappable(a, b)?;
        self.grid.swap(a.to_nd_index(), b.to_nd_index());
        self.calculate_matches();
        let found = !self.matches.is_empty();
        self.grid.swap(a.to_nd_index(), b.to_nd_index());
        self.matches.clear();
        Ok(found)
    }

    /// The two relocations a committed swap performs, for the animation step.
    pub fn swap_moves(&self, a: Coord2, b: Coord2) -> Result<[TileMove; 2]> {
        let (a, b) = self.check_swappable(a, b)?;
        let tile_a = self.grid[a.to_nd_index()].ok_or(GameError::MissingTile)?;
        let tile_b = self.grid[b.to_nd_index()].ok_or(GameError::MissingTile)?;
        Ok([
            TileMove {
                id: tile_a.id,
                from: a,
                to: b,
            },
            TileMove {
                id: tile_b.id,
                from: b,
                to: a,
            },
        ])
    }

    /// Permanently exchanges two adjacent grid slots and re-syncs both tiles'
    /// coordinates. The caller always follows up with a detection pass.
    pub fn swap(&mut self, a: Coord2, b: Coord2) -> Result<()> {
        let (a, b) = self.check_swappable(a, b)?;
        self.grid.swap(a.to_nd_index(), b.to_nd_index());
        if let Some(tile) = self.grid[a.to_nd_index()].as_mut() {
            tile.pos = a;
        }
        if let Some(tile) = self.grid[b.to_nd_index()].as_mut() {
            tile.pos = b;
        }
        log::debug!("Swapped tiles at {:?} and {:?}", a, b);
        Ok(())
    }

    /// Removes the deduplicated match set, leaving holes in place, and
    /// returns the removed tiles for scoring. Does not shift survivors.
    pub fn remove_matches(&mut self) -> Vec<Tile> {
        let cells = self.matched_cells();
        let mut removed = Vec::with_capacity(cells.len());
        for pos in cells {
            if let Some(tile) = self.grid[pos.to_nd_index()].take() {
                removed.push(tile);
            }
        }
        self.matches.clear();
        log::debug!("Removed {} matched tiles", removed.len());
        removed
    }

    /// Per-column downward compaction plan: where each surviving tile comes
    /// to rest once it falls past the holes beneath it. Does not mutate the
    /// grid; the host animates the plan, then commits it with
    /// [`Board::apply_moves`].
    pub fn falling_tiles(&self) -> Vec<TileMove> {
        let (width, height) = self.size();
        let mut moves = Vec::new();
        for x in 0..width {
            let mut dest_y = height;
            for y in (0..height).rev() {
                if let Some(tile) = self.grid[(x, y).to_nd_index()] {
                    dest_y -= 1;
                    if dest_y != y {
                        moves.push(TileMove {
                            id: tile.id,
                            from: (x, y),
                            to: (x, dest_y),
                        });
                    }
                }
            }
        }
        moves
    }

    /// Commits a fall plan: relocates each tile and re-syncs its coordinates.
    /// Plans from [`Board::falling_tiles`] are ordered bottom-up per column,
    /// so every destination is free by the time its move applies.
    pub fn apply_moves(&mut self, moves: &[TileMove]) -> Result<()> {
        for mv in moves {
            let from = self.validate_coords(mv.from)?;
            let to = self.validate_coords(mv.to)?;
            let mut tile = self.grid[from.to_nd_index()]
                .take()
                .ok_or(GameError::MissingTile)?;
            debug_assert_eq!(tile.id, mv.id);
            debug_assert!(self.grid[to.to_nd_index()].is_none());
            tile.pos = to;
            self.grid[to.to_nd_index()] = Some(tile);
        }
        Ok(())
    }

    /// Rolls a fresh tile for every hole, drawn from the level's palette.
    /// Does not mutate the grid; each spawn is committed individually with
    /// [`Board::place_spawn`] after its tween settles.
    pub fn refill_tiles(&mut self, generator: &mut impl TileGenerator) -> Vec<TileSpawn> {
        let palette = LevelPalette::for_level(self.level);
        let (width, height) = self.size();
        let mut spawns = Vec::new();
        for x in 0..width {
            for y in 0..height {
                if self.grid[(x, y).to_nd_index()].is_none() {
                    let tile = self.fresh_tile((x, y), generator, &palette);
                    spawns.push(TileSpawn { tile, to: (x, y) });
                }
            }
        }
        log::debug!("Rolled {} refill tiles", spawns.len());
        spawns
    }

    pub fn place_spawn(&mut self, spawn: TileSpawn) -> Result<()> {
        let to = self.validate_coords(spawn.to)?;
        debug_assert!(self.grid[to.to_nd_index()].is_none());
        let mut tile = spawn.tile;
        tile.pos = to;
        self.grid[to.to_nd_index()] = Some(tile);
        Ok(())
    }

    fn check_swappable(&self, a: Coord2, b: Coord2) -> Result<(Coord2, Coord2)> {
        let a = self.validate_coords(a)?;
        let b = self.validate_coords(b)?;
        if manhattan(a, b) != 1 {
            return Err(GameError::NotAdjacent);
        }
        if self.grid[a.to_nd_index()].is_none() || self.grid[b.to_nd_index()].is_none() {
            return Err(GameError::MissingTile);
        }
        Ok((a, b))
    }

    fn scan_line(&mut self, axis: MatchAxis, cells: impl Iterator<Item = Coord2>) {
        let mut run: SmallVec<[Coord2; 8]> = SmallVec::new();
        let mut run_color: Option<TileColor> = None;
        for pos in cells {
            let color = self.grid[pos.to_nd_index()].as_ref().map(|tile| tile.color);
            match (run_color, color) {
                (Some(current), Some(next)) if current == next => run.push(pos),
                _ => {
                    self.flush_run(axis, run_color, core::mem::take(&mut run));
                    run_color = color;
                    if color.is_some() {
                        run.push(pos);
                    }
                }
            }
        }
        self.flush_run(axis, run_color, run);
    }

    fn flush_run(&mut self, axis: MatchAxis, color: Option<TileColor>, cells: SmallVec<[Coord2; 8]>) {
        if let Some(color) = color {
            if cells.len() >= MIN_RUN {
                log::trace!("{:?} run of {} {:?} at {:?}", axis, cells.len(), color, cells[0]);
                self.matches.push(MatchRun { axis, color, cells });
            }
        }
    }

    fn fresh_tile(
        &mut self,
        pos: Coord2,
        generator: &mut impl TileGenerator,
        palette: &LevelPalette,
    ) -> Tile {
        let (color, pattern) = generator.roll(palette);
        Tile::new(self.take_tile_id(), pos, color, pattern)
    }

    fn take_tile_id(&mut self) -> TileId {
        let id = TileId(self.next_tile_id);
        self.next_tile_id += 1;
        id
    }
}

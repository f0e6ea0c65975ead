use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::types::Coord2;

/// An adjacent pair whose swap would produce a match, surfaced to the player
/// without being committed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub a: Coord2,
    pub b: Coord2,
}

/// Exhaustive first-found search for a hint-worthy move.
///
/// Scans in raster order and probes each cell only against its right and down
/// neighbours, so no pair is checked twice. Every probe goes through the pure
/// [`Board::would_match`] lookahead, so the grid is left exactly as it was no
/// matter the outcome. Returns `None` when no adjacent swap on the whole
/// board would match.
pub fn find_hint(board: &mut Board) -> Option<Hint> {
    let (width, height) = board.size();
    for y in 0..height {
        for x in 0..width {
            let a = (x, y);
            let right = (x + 1, y);
            let down = (x, y + 1);
            for b in [right, down] {
                if b.0 >= width || b.1 >= height {
                    continue;
                }
                log::trace!("Probing hint pair {:?} / {:?}", a, b);
                if board.would_match(a, b).unwrap_or(false) {
                    return Some(Hint { a, b });
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{TileColor, TilePattern};
    use alloc::vec::Vec;
    use TileColor::*;

    fn board_from(colors: &[&[TileColor]]) -> Board {
        let rows: Vec<Vec<(TileColor, TilePattern)>> = colors
            .iter()
            .map(|row| row.iter().map(|&color| (color, TilePattern::Flat)).collect())
            .collect();
        let borrowed: Vec<&[(TileColor, TilePattern)]> =
            rows.iter().map(|row| row.as_slice()).collect();
        Board::from_rows(1, &borrowed).unwrap()
    }

    #[test]
    fn finds_the_first_pair_in_raster_order() {
        // no pair before (2,0)/(2,1) in raster order produces a match
        let mut board = board_from(&[
            &[Red, Red, Green],
            &[Green, Green, Red],
            &[Blue, Yellow, Blue],
        ]);

        let hint = find_hint(&mut board).unwrap();

        assert_eq!(hint, Hint { a: (2, 0), b: (2, 1) });
    }

    #[test]
    fn search_leaves_the_grid_untouched() {
        let mut board = board_from(&[
            &[Red, Red, Green],
            &[Green, Green, Red],
            &[Blue, Yellow, Blue],
        ]);
        let snapshot = board.clone();

        find_hint(&mut board);

        assert_eq!(board, snapshot);
    }

    #[test]
    fn deadlocked_board_yields_no_hint() {
        // every row and column holds three distinct colors, so no single
        // swap can line up three
        let mut board = board_from(&[
            &[Red, Green, Blue],
            &[Green, Blue, Red],
            &[Blue, Red, Green],
        ]);
        let snapshot = board.clone();

        assert_eq!(find_hint(&mut board), None);
        assert_eq!(board, snapshot);
    }
}

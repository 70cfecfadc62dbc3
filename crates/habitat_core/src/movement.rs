//! Position classification and movement rules.
//!
//! A cell is classified per axis into a [`Band`]: against the low wall,
//! against the high wall, or free. The pair of bands gives the nine
//! placements (interior, four edges, four corners) and each band fixes the
//! legal step range on its axis, so the neighbour set is the product of the
//! two ranges:
//!
//! ```text
//!   corner (Low, Low)    edge (Low, Mid)      interior (Mid, Mid)
//!   +------              -----------          # # #
//!   | Q #                  # Q #              # Q #
//!   | # #                  # # #              # # #
//! ```
//!
//! Staying in place is always legal.

use rand::Rng;
use std::ops::RangeInclusive;

/// Where an index sits along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// Index 0 on an axis longer than one cell.
    Low,
    /// Strictly between the walls.
    Mid,
    /// Last index on an axis longer than one cell.
    High,
    /// Axis of length one: no step is possible.
    Pinned,
}

impl Band {
    /// Indices at or past the last cell count as the high wall, so a stray
    /// position only ever steps back towards the grid. Reading such a cell
    /// is still reported as out of bounds by the grid.
    pub fn of(index: usize, len: usize) -> Self {
        if len <= 1 {
            Band::Pinned
        } else if index == 0 {
            Band::Low
        } else if index >= len - 1 {
            Band::High
        } else {
            Band::Mid
        }
    }

    /// Legal offsets along this axis.
    pub fn step_range(self) -> RangeInclusive<isize> {
        match self {
            Band::Low => 0..=1,
            Band::Mid => -1..=1,
            Band::High => -1..=0,
            Band::Pinned => 0..=0,
        }
    }

    fn is_wall(self) -> bool {
        matches!(self, Band::Low | Band::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub vertical: Band,
    pub horizontal: Band,
}

impl Placement {
    pub fn classify(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self {
            vertical: Band::of(row, rows),
            horizontal: Band::of(col, cols),
        }
    }

    pub fn is_corner(self) -> bool {
        self.vertical.is_wall() && self.horizontal.is_wall()
    }

    pub fn is_edge(self) -> bool {
        self.vertical.is_wall() != self.horizontal.is_wall()
    }

    pub fn is_interior(self) -> bool {
        self.vertical == Band::Mid && self.horizontal == Band::Mid
    }

    /// Every `(row, col)` reachable in one step from `(row, col)`.
    pub fn neighbours(self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(9);
        for dr in self.vertical.step_range() {
            for dc in self.horizontal.step_range() {
                out.push((offset(row, dr), offset(col, dc)));
            }
        }
        out
    }
}

#[inline]
fn offset(index: usize, delta: isize) -> usize {
    index.wrapping_add_signed(delta)
}

/// Draws the next position uniformly from the legal neighbour set of
/// `(row, col)`. The result is always inside `[0, rows) x [0, cols)`.
pub fn step_target<R: Rng + ?Sized>(
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> (usize, usize) {
    let placement = Placement::classify(row, col, rows, cols);
    let dr = rng.gen_range(placement.vertical.step_range());
    let dc = rng.gen_range(placement.horizontal.step_range());
    (offset(row, dr), offset(col, dc))
}

/// Picks a uniformly random cell on one of the four border lines: a coin
/// flip chooses the axis, a second one chooses the near or far wall.
pub fn perimeter_coordinates<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> (usize, usize) {
    if rng.gen_bool(0.5) {
        let col = rng.gen_range(0..cols);
        let row = if rng.gen_bool(0.5) { 0 } else { rows - 1 };
        (row, col)
    } else {
        let row = rng.gen_range(0..rows);
        let col = if rng.gen_bool(0.5) { 0 } else { cols - 1 };
        (row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    const ROWS: usize = 12;
    const COLS: usize = 9;

    /// One representative position for each of the nine placements.
    fn representatives() -> Vec<(usize, usize)> {
        let rs = [0, ROWS / 2, ROWS - 1];
        let cs = [0, COLS / 2, COLS - 1];
        rs.iter()
            .flat_map(|&r| cs.iter().map(move |&c| (r, c)))
            .collect()
    }

    #[test]
    fn test_nine_distinct_placements() {
        let placements: HashSet<_> = representatives()
            .into_iter()
            .map(|(r, c)| Placement::classify(r, c, ROWS, COLS))
            .collect();
        assert_eq!(placements.len(), 9);
        assert_eq!(placements.iter().filter(|p| p.is_corner()).count(), 4);
        assert_eq!(placements.iter().filter(|p| p.is_edge()).count(), 4);
        assert_eq!(placements.iter().filter(|p| p.is_interior()).count(), 1);
    }

    #[test]
    fn test_neighbour_set_sizes() {
        let p = Placement::classify(5, 5, ROWS, COLS);
        assert_eq!(p.neighbours(5, 5).len(), 9);
        let p = Placement::classify(0, 4, ROWS, COLS);
        assert_eq!(p.neighbours(0, 4).len(), 6);
        let p = Placement::classify(ROWS - 1, COLS - 1, ROWS, COLS);
        assert_eq!(p.neighbours(ROWS - 1, COLS - 1).len(), 4);
    }

    #[test]
    fn test_steps_stay_in_legal_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for (row, col) in representatives() {
            let placement = Placement::classify(row, col, ROWS, COLS);
            let legal: HashSet<_> = placement.neighbours(row, col).into_iter().collect();
            assert!(legal.contains(&(row, col)), "stay must be legal");

            let mut seen = HashSet::new();
            for _ in 0..10_000 {
                let target = step_target(row, col, ROWS, COLS, &mut rng);
                assert!(target.0 < ROWS && target.1 < COLS);
                assert!(legal.contains(&target), "{target:?} not legal from ({row}, {col})");
                seen.insert(target);
            }
            assert_eq!(seen, legal, "every legal neighbour should be reachable");
        }
    }

    #[test]
    fn test_single_row_grid_is_pinned_vertically() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1_000 {
            let (r, c) = step_target(0, 3, 1, 6, &mut rng);
            assert_eq!(r, 0);
            assert!(c < 6);
        }
        assert_eq!(step_target(0, 0, 1, 1, &mut rng), (0, 0));
    }

    #[test]
    fn test_perimeter_spawn_lands_on_border() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut walls = [false; 4];
        for _ in 0..5_000 {
            let (r, c) = perimeter_coordinates(ROWS, COLS, &mut rng);
            assert!(r < ROWS && c < COLS);
            assert!(r == 0 || r == ROWS - 1 || c == 0 || c == COLS - 1);
            walls[0] |= r == 0;
            walls[1] |= r == ROWS - 1;
            walls[2] |= c == 0;
            walls[3] |= c == COLS - 1;
        }
        assert!(walls.iter().all(|&w| w));
    }

    #[test]
    fn test_stray_position_walks_back() {
        assert_eq!(Band::of(10, 6), Band::High);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut pos = (10, 10);
        let mut steps = 0;
        while pos.0 >= 6 || pos.1 >= 6 {
            let next = step_target(pos.0, pos.1, 6, 6, &mut rng);
            assert!(pos.0 < 6 || next.0 <= pos.0);
            assert!(pos.1 < 6 || next.1 <= pos.1);
            pos = next;
            steps += 1;
            assert!(steps < 200, "never got back on the grid");
        }
    }
}

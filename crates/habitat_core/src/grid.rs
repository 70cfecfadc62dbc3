//! Shared resource grid.
//!
//! Every cell carries a single food flag. Foraging is an atomic
//! test-and-clear so any number of agents may probe the same cell
//! concurrently and at most one of them wins a placed unit.
//!
//! `replenish` and `clear_all` are meant to be called by exactly one
//! coordinator per round boundary. They take no lock against in-flight
//! `try_consume` calls; an agent racing a boundary may miss or see one
//! extra unit in that window.

use crate::error::GridError;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single grid slot.
#[derive(Debug, Default)]
pub struct Cell {
    has_food: AtomicBool,
}

impl Cell {
    /// Takes the food unit if present. Returns `true` only for the caller
    /// that actually cleared the flag.
    #[inline]
    pub fn take(&self) -> bool {
        self.has_food.swap(false, Ordering::AcqRel)
    }

    /// Sets the food flag.
    #[inline]
    pub fn put(&self) {
        self.has_food.store(true, Ordering::Release);
    }

    #[inline]
    pub fn has_food(&self) -> bool {
        self.has_food.load(Ordering::Acquire)
    }
}

/// Row-major grid of [`Cell`]s shared by every agent.
#[derive(Debug)]
pub struct ResourceGrid {
    cells: Vec<Cell>,
    rows: usize,
    cols: usize,
}

impl ResourceGrid {
    /// Creates an empty grid. Both dimensions must be non-zero; the
    /// configuration layer rejects empty grids before this is reached.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "grid dimensions must be non-zero");
        let cells = (0..rows * cols).map(|_| Cell::default()).collect();
        Self { cells, rows, cols }
    }

    #[inline(always)]
    fn index(&self, row: usize, col: usize) -> Result<usize, GridError> {
        if row >= self.rows || col >= self.cols {
            return Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Bounds-checked access to one cell.
    pub fn cell(&self, row: usize, col: usize) -> Result<&Cell, GridError> {
        let idx = self.index(row, col)?;
        Ok(&self.cells[idx])
    }

    /// Atomically consumes the food at `(row, col)`.
    pub fn try_consume(&self, row: usize, col: usize) -> Result<bool, GridError> {
        Ok(self.cell(row, col)?.take())
    }

    /// Places food at `(row, col)`. Idempotent.
    pub fn place(&self, row: usize, col: usize) -> Result<(), GridError> {
        self.cell(row, col)?.put();
        Ok(())
    }

    /// Whether `(row, col)` holds food, without consuming it.
    pub fn has_food(&self, row: usize, col: usize) -> Result<bool, GridError> {
        Ok(self.cell(row, col)?.has_food())
    }

    /// Removes every food unit. Meant for the boundary coordinator only.
    pub fn clear_all(&self) {
        for cell in &self.cells {
            cell.take();
        }
    }

    /// Marks `rows * cols * fraction` randomly drawn cells. Draws may repeat,
    /// so the share of cells that end up holding food is at most `fraction`
    /// and usually a little below it.
    pub fn replenish<R: Rng + ?Sized>(&self, fraction: f64, rng: &mut R) -> usize {
        let picks = (self.cells.len() as f64 * fraction) as usize;
        for _ in 0..picks {
            let idx = rng.gen_range(0..self.cells.len());
            self.cells[idx].put();
        }
        picks
    }

    /// Cells currently holding food.
    pub fn food_count(&self) -> usize {
        self.cells.iter().filter(|c| c.has_food()).count()
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_every_in_range_cell_is_addressable() {
        for (rows, cols) in [(1, 1), (1, 7), (6, 1), (10, 10), (3, 17)] {
            let grid = ResourceGrid::new(rows, cols);
            for r in 0..rows {
                for c in 0..cols {
                    grid.place(r, c).unwrap();
                    assert!(grid.try_consume(r, c).unwrap());
                    assert!(!grid.try_consume(r, c).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let grid = ResourceGrid::new(4, 5);
        assert_eq!(
            grid.try_consume(4, 0),
            Err(GridError::OutOfBounds {
                row: 4,
                col: 0,
                rows: 4,
                cols: 5
            })
        );
        assert!(grid.place(0, 5).is_err());
        assert!(grid.has_food(usize::MAX, 0).is_err());
    }

    #[test]
    fn test_place_is_idempotent() {
        let grid = ResourceGrid::new(3, 3);
        grid.place(1, 1).unwrap();
        grid.place(1, 1).unwrap();
        assert_eq!(grid.food_count(), 1);
        assert!(grid.try_consume(1, 1).unwrap());
        assert!(!grid.try_consume(1, 1).unwrap());
    }

    #[test]
    fn test_concurrent_consumers_win_once() {
        let grid = Arc::new(ResourceGrid::new(2, 2));
        for _ in 0..50 {
            grid.place(0, 1).unwrap();
            let winners = Arc::new(AtomicUsize::new(0));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let grid = Arc::clone(&grid);
                    let winners = Arc::clone(&winners);
                    std::thread::spawn(move || {
                        if grid.try_consume(0, 1).unwrap() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(winners.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_replenish_coverage_is_bounded() {
        let grid = ResourceGrid::new(25, 25);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let picks = grid.replenish(0.11, &mut rng);
        assert_eq!(picks, 68);
        let food = grid.food_count();
        assert!(food > 0 && food <= picks);

        grid.clear_all();
        assert_eq!(grid.food_count(), 0);
    }
}

use habitat_core::movement::{perimeter_coordinates, step_target, Placement};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

prop_compose! {
    fn arb_grid_and_cell()(rows in 1usize..40, cols in 1usize..40)(
        row in 0..rows,
        col in 0..cols,
        rows in Just(rows),
        cols in Just(cols)
    ) -> (usize, usize, usize, usize) {
        (row, col, rows, cols)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_steps_stay_on_grid_and_adjacent(
        (row, col, rows, cols) in arb_grid_and_cell(),
        seed in any::<u64>()
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let legal = Placement::classify(row, col, rows, cols).neighbours(row, col);
        prop_assert!(legal.contains(&(row, col)));
        for _ in 0..50 {
            let (r, c) = step_target(row, col, rows, cols, &mut rng);
            prop_assert!(r < rows && c < cols);
            prop_assert!(legal.contains(&(r, c)), "({}, {}) not legal from ({}, {})", r, c, row, col);
        }
    }

    #[test]
    fn test_random_walk_never_leaves_grid(
        (row, col, rows, cols) in arb_grid_and_cell(),
        seed in any::<u64>()
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut pos = (row, col);
        for _ in 0..500 {
            pos = step_target(pos.0, pos.1, rows, cols, &mut rng);
            prop_assert!(pos.0 < rows && pos.1 < cols);
        }
    }

    #[test]
    fn test_perimeter_spawn_on_border(
        rows in 1usize..60,
        cols in 1usize..60,
        seed in any::<u64>()
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..20 {
            let (r, c) = perimeter_coordinates(rows, cols, &mut rng);
            prop_assert!(r < rows && c < cols);
            prop_assert!(r == 0 || r == rows - 1 || c == 0 || c == cols - 1);
        }
    }
}

use habitat_core::grid::ResourceGrid;
use habitat_core::stats::StatisticsLog;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_each_unit_is_eaten_once_under_contention() {
    let grid = Arc::new(ResourceGrid::new(8, 8));
    for r in 0..8 {
        for c in 0..8 {
            grid.place(r, c).unwrap();
        }
    }
    let eaten = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(12));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let grid = Arc::clone(&grid);
            let eaten = Arc::clone(&eaten);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for r in 0..8 {
                    for c in 0..8 {
                        if grid.try_consume(r, c).unwrap() {
                            eaten.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(eaten.load(Ordering::Relaxed), 64);
    assert_eq!(grid.food_count(), 0);
}

#[test]
fn test_concurrent_reports_commit_exactly() {
    let stats = Arc::new(StatisticsLog::new());
    for round in 1..=5usize {
        let handles: Vec<_> = (0..round * 10)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || stats.report_alive())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.commit_round(), round * 10);
        assert_eq!(stats.live_count(), 0);
    }
    assert_eq!(stats.snapshot(), vec![10, 20, 30, 40, 50]);
}

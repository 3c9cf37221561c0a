//! Data-parallel helpers shared by every per-pixel loop
//!
//! Loops poll an optional [`CancellationToken`] once per work item (a row or a
//! chunk). Cancellation only ends the loop: whatever was written so far stays in
//! the output buffer and the caller decides what a partial result means.

use rayon::prelude::*;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::types::PixelBuffer;

/// Marker returned from a work item when the token fired
#[derive(Debug, Clone, Copy)]
struct Cancelled;

/// True when a token is present and has been cancelled
#[must_use]
pub fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// Run `op` on every item of a parallel iterator, stopping once the token fires
///
/// Returns `true` when every item was processed.
pub fn for_each_cancellable<I, F>(items: I, token: Option<&CancellationToken>, op: F) -> bool
where
    I: ParallelIterator,
    F: Fn(I::Item) + Sync + Send,
{
    items
        .try_for_each(|item| {
            if is_cancelled(token) {
                return Err(Cancelled);
            }
            op(item);
            Ok(())
        })
        .is_ok()
}

/// Run `op(y, row)` on every row of `buffer` in parallel
///
/// Rows are handed out without their padding. Returns `true` when every row was
/// processed, `false` when the token stopped the loop early.
pub fn for_each_row_mut<F>(buffer: &mut PixelBuffer, token: Option<&CancellationToken>, op: F) -> bool
where
    F: Fn(u32, &mut [u8]) + Sync + Send,
{
    for_each_cancellable(buffer.par_rows_mut(), token, |(y, row)| op(y as u32, row))
}

/// Sum `op(y)` over the given rows with an atomic accumulator
pub fn atomic_sum<I, F>(rows: I, op: F) -> i64
where
    I: ParallelIterator<Item = u32>,
    F: Fn(u32) -> i64 + Sync + Send,
{
    let total = AtomicI64::new(0);
    rows.for_each(|y| {
        let partial = op(y);
        if partial != 0 {
            total.fetch_add(partial, Ordering::Relaxed);
        }
    });
    total.into_inner()
}

/// Accumulate into `bins` atomic counters; `op(y, bins)` adds to any of them
pub fn atomic_bins<I, F>(rows: I, bins: usize, op: F) -> Vec<i64>
where
    I: ParallelIterator<Item = u32>,
    F: Fn(u32, &[AtomicI64]) + Sync + Send,
{
    let counters: Vec<AtomicI64> = (0..bins).map(|_| AtomicI64::new(0)).collect();
    rows.for_each(|y| op(y, &counters));
    counters.into_iter().map(AtomicI64::into_inner).collect()
}

/// Rows `start, start + step, ...` below `end`, as a parallel iterator
pub fn stepped_rows(start: u32, end: u32, step: usize) -> impl ParallelIterator<Item = u32> {
    (start..end.max(start)).into_par_iter().step_by(step.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelLayout;

    #[test]
    fn test_row_loop_covers_every_row() {
        let mut buffer = PixelBuffer::new(4, 16, PixelLayout::Rgb8);
        let completed = for_each_row_mut(&mut buffer, None, |_, row| row.fill(7));

        assert!(completed);
        assert!(buffer.as_raw().iter().all(|&v| v == 7));
    }

    #[test]
    fn test_pre_cancelled_token_stops_before_any_row() {
        let token = CancellationToken::new();
        token.cancel();
        let mut buffer = PixelBuffer::new(4, 16, PixelLayout::Rgb8);

        let completed = for_each_row_mut(&mut buffer, Some(&token), |_, row| row.fill(7));

        assert!(!completed);
        assert!(buffer.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_atomic_sum_matches_sequential_sum() {
        let total = atomic_sum((0..100u32).into_par_iter(), i64::from);
        assert_eq!(total, (0..100).sum::<i64>());
    }

    #[test]
    fn test_stepped_rows() {
        let mut rows: Vec<u32> = stepped_rows(1, 20, 8).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![1, 9, 17]);
        assert_eq!(stepped_rows(5, 3, 8).count(), 0);
    }

    #[test]
    fn test_atomic_bins() {
        let bins = atomic_bins((0..10u32).into_par_iter(), 2, |y, bins| {
            bins[(y % 2) as usize].fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(bins, vec![5, 5]);
    }
}

//! The unit of wasted CPU work
//!
//! A slice has a fixed cost, touches no shared state and does no I/O, so
//! any number of workers can call it concurrently.

use std::hint::black_box;

/// Sequentially dependent square roots per slice
pub const SLICE_ITERATIONS: u32 = 10_000;

/// Burn one slice of CPU
///
/// Each step depends on the previous one and the result goes through
/// `black_box`, so the loop cannot be folded away or vectorized.
#[inline(never)]
pub fn burn_once() -> f64 {
    let mut e = 0.0f64;
    for i in 0..black_box(SLICE_ITERATIONS) {
        e = (f64::from(i) + e).sqrt();
    }
    black_box(e)
}

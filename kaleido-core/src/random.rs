use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of integer randomness handed to each entity.
///
/// Entities never reach for an ambient generator; whoever builds them decides
/// where the numbers come from, so tests can script exact sequences.
pub trait RandomSource: Send {
    /// Returns a value in the half-open range `[low, high)`. Callers guarantee `low < high`.
    fn next_in_range(&mut self, low: i32, high: i32) -> i32;
}

/// Production source backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn next_in_range(&mut self, low: i32, high: i32) -> i32 {
        self.rng.gen_range(low..high)
    }
}

/// Replays a fixed list of values, cycling when exhausted.
///
/// Values are folded into the requested range so a script written for one
/// range never produces an out-of-range draw.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<i32>,
    cursor: usize,
}

impl SequenceRandom {
    pub fn new(values: Vec<i32>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl RandomSource for SequenceRandom {
    fn next_in_range(&mut self, low: i32, high: i32) -> i32 {
        if self.values.is_empty() {
            return low;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        let span = i64::from(high) - i64::from(low);
        let offset = (i64::from(value) - i64::from(low)).rem_euclid(span);
        (i64::from(low) + offset) as i32
    }
}

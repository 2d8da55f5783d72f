//! xorshift64* random number generator
//!
//! Fast, deterministic PRNG with 64-bit state. The session draws from it
//! only while setting up the group (role shuffling, label sampling) and in
//! the random action source, so the same seed always yields the same group
//! and, given the same actions, the same session.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use labor_market_core::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.range(0, 100); // [0, 100)
/// assert!((0..100).contains(&value));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed (0 is mapped to 1)
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Next raw 64-bit value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Random value in `[min, max)`
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Random index in `[0, len)`
    ///
    /// # Panics
    /// Panics if len is 0
    pub fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot pick from an empty range");
        (self.next() % len as u64) as usize
    }

    /// Random f64 in `[0.0, 1.0)`
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Current state, for checkpointing
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Fisher-Yates shuffle in place
    ///
    /// # Example
    /// ```
    /// use labor_market_core::RngManager;
    ///
    /// let mut ids = vec![1, 2, 3, 4, 5, 6];
    /// RngManager::new(7).shuffle(&mut ids);
    ///
    /// let mut sorted = ids.clone();
    /// sorted.sort();
    /// assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
    /// ```
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }

    /// Draw `count` distinct items from `pool`, in draw order
    ///
    /// Returns `None` if the pool has fewer than `count` items.
    pub fn sample<T: Clone>(&mut self, pool: &[T], count: usize) -> Option<Vec<T>> {
        if pool.len() < count {
            return None;
        }
        let mut indices: Vec<usize> = (0..pool.len()).collect();
        self.shuffle(&mut indices);
        Some(indices[..count].iter().map(|&i| pool[i].clone()).collect())
    }
}

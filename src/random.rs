// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible seed progression for dataset shuffles
//!
//! Every run of a configuration is shuffled with its own seed. Seeds walk the
//! prime numbers starting after [`INITIAL_SEED`], so the n-th run of any
//! configuration always sees the same shuffle.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed value a source holds right after [`SeededRandomSource::reset`]
pub const INITIAL_SEED: u64 = 1;

/// Restartable sequence of prime seeds
#[derive(Debug, Clone)]
pub struct SeededRandomSource {
    seed: u64,
}

impl Default for SeededRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SeededRandomSource {
    pub fn new() -> Self {
        Self { seed: INITIAL_SEED }
    }

    /// Rewind to the initial seed
    pub fn reset(&mut self) {
        self.seed = INITIAL_SEED;
    }

    /// Seed handed out by the most recent call to [`next`](Self::next)
    pub fn current_seed(&self) -> u64 {
        self.seed
    }

    /// Advance to the next prime seed and return a generator initialized with it
    pub fn next(&mut self) -> ChaCha8Rng {
        self.seed = next_prime(self.seed + 1);
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

/// Smallest prime greater than or equal to `n`
pub fn next_prime(n: u64) -> u64 {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut divisor = 5;
    while divisor * divisor <= n {
        if n % divisor == 0 || n % (divisor + 2) == 0 {
            return false;
        }
        divisor += 6;
    }
    true
}

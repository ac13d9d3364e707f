//! Enumeration of all chords with a fixed number of pitch classes.

use crate::types::{Chord, Edo};

/// Iterator over all `C(N, k)` chords of `N` bits with exactly `k` set.
///
/// Chords come out in lexicographic order of their position tuples
/// `(p_1 < p_2 < ... < p_k)`, the standard combinatorial index order.
/// The iterator is pure: a fresh one always restarts from the first tuple.
pub struct Combinations {
    n: u32,
    positions: Vec<u32>,
    done: bool,
}

impl Combinations {
    pub fn new(edo: Edo, k: u32) -> Self {
        let n = edo.get();
        Self {
            n,
            positions: (0..k).collect(),
            done: k > n,
        }
    }

    fn advance(&mut self) {
        let k = self.positions.len();
        // Rightmost position that can still move right.
        let Some(i) = (0..k).rev().find(|&i| self.positions[i] < self.n - (k - i) as u32) else {
            self.done = true;
            return;
        };
        self.positions[i] += 1;
        for j in i + 1..k {
            self.positions[j] = self.positions[j - 1] + 1;
        }
    }
}

impl Iterator for Combinations {
    type Item = Chord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chord = self.positions.iter().fold(0u64, |mask, &p| mask | (1u64 << p));
        self.advance();
        Some(Chord::from_mask(chord))
    }
}

/// All chords of `edo` with exactly `k` pitch classes.
pub fn combinations(edo: Edo, k: u32) -> Combinations {
    Combinations::new(edo, k)
}

/// Binomial coefficient `C(n, k)`, saturating at `u64::MAX`.
pub fn binomial(n: u32, k: u32) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u64;
    let mut result: u128 = 1;
    for i in 0..k {
        result = result * (n as u128 - i as u128) / (i as u128 + 1);
        if result > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    result as u64
}

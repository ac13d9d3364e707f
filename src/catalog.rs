//! Per-size tables of canonical necklaces.
//!
//! For a cycle length `N`, the catalog holds `N + 1` lists; list `s` is the
//! ascending (by mask value) list of distinct canonical representatives with
//! exactly `s` pitch classes. Building it canonicalizes every one of the
//! `2^N` chords, which makes it the dominant cost of the whole engine, so
//! construction runs against a [`CatalogConfig`] budget.
//!
//! # Invariants
//!
//! - `sizes.len() == N + 1`
//! - `sizes[0] == [0...0]` and `sizes[N] == [1...1]`
//! - every entry is canonical, with the size of its list
//! - every list is strictly increasing (no duplicate necklaces)
//! - the total number of entries equals [`necklace_count`]`(N)`

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use log::{debug, info};
use num_bigint::BigUint;

use crate::combinations::{binomial, combinations};
use crate::error::{Error, Result};
use crate::rotation::{canonicalize, is_canonical};
use crate::types::{Chord, Edo};

/// Resource budget for catalog construction.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Maximum number of canonicalizations (`2^N` for a full build) (default: 2^26)
    pub max_work: u64,
    /// Wall-clock limit for a single build (default: none)
    pub time_limit: Option<Duration>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_work: 1 << 26,
            time_limit: None,
        }
    }
}

impl CatalogConfig {
    /// A budget that admits every supported cycle length. `max_work ==
    /// u64::MAX` disables the work check, so `N = 64` (`2^64` chords) builds.
    pub fn unlimited() -> Self {
        Self {
            max_work: u64::MAX,
            time_limit: None,
        }
    }
}

/// How often (in canonicalizations) the time limit is polled.
const TIME_CHECK_INTERVAL: u64 = 1 << 12;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Catalog {
    edo: Edo,
    sizes: Vec<Vec<Chord>>,
}

impl Catalog {
    /// Builds the catalog for `edo`, failing with [`Error::ResourceExhausted`]
    /// instead of exceeding the budget.
    pub fn build(edo: Edo, config: &CatalogConfig) -> Result<Self> {
        let n = edo.get();
        check_budget(edo, config)?;

        let start = Instant::now();
        let mut done = 0u64;
        let mut sizes = Vec::with_capacity(edo.len() + 1);
        for s in 0..=n {
            let mut necklaces = BTreeSet::new();
            for chord in combinations(edo, s) {
                necklaces.insert(canonicalize(chord, edo).representative);
                done = done.wrapping_add(1);
                if done % TIME_CHECK_INTERVAL == 0 {
                    check_time(edo, start, config)?;
                }
            }
            debug!("size {}: {} chords, {} necklaces", s, binomial(n, s), necklaces.len());
            sizes.push(necklaces.into_iter().collect());
        }

        let catalog = Self { edo, sizes };
        info!(
            "Built catalog for {}: {} necklaces in {:?}",
            edo,
            catalog.total(),
            start.elapsed()
        );
        Ok(catalog)
    }

    /// Reassembles a catalog from stored lists, checking every invariant.
    pub fn from_sizes(edo: Edo, sizes: Vec<Vec<Chord>>) -> std::result::Result<Self, String> {
        let catalog = Self { edo, sizes };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn edo(&self) -> Edo {
        self.edo
    }

    /// All lists, indexed by size.
    pub fn sizes(&self) -> &[Vec<Chord>] {
        &self.sizes
    }

    /// The list for one size, if `size <= N`.
    pub fn size(&self, size: usize) -> Option<&[Chord]> {
        self.sizes.get(size).map(Vec::as_slice)
    }

    /// Looks up the necklace at `(size, index)`.
    pub fn entry(&self, size: usize, index: usize) -> Result<Chord> {
        let list = self.size(size).ok_or(Error::IndexOutOfRange { size, index, len: 0 })?;
        list.get(index).copied().ok_or(Error::IndexOutOfRange {
            size,
            index,
            len: list.len(),
        })
    }

    /// Number of necklaces of each size.
    pub fn counts(&self) -> Vec<usize> {
        self.sizes.iter().map(Vec::len).collect()
    }

    /// Total number of necklaces.
    pub fn total(&self) -> usize {
        self.sizes.iter().map(Vec::len).sum()
    }

    /// Iterates over `(size, index, chord)` for every entry.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Chord)> + '_ {
        self.sizes
            .iter()
            .enumerate()
            .flat_map(|(s, list)| list.iter().enumerate().map(move |(i, &c)| (s, i, c)))
    }

    /// Checks every catalog invariant, describing the first violation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let n = self.edo.len();
        if self.sizes.len() != n + 1 {
            return Err(format!("expected {} size lists, found {}", n + 1, self.sizes.len()));
        }
        for (s, list) in self.sizes.iter().enumerate() {
            for (i, &chord) in list.iter().enumerate() {
                if chord.mask() & !self.edo.full_mask() != 0 {
                    return Err(format!("entry ({}, {}) has bits beyond {}", s, i, self.edo));
                }
                if chord.size() as usize != s {
                    return Err(format!("entry ({}, {}) has size {}", s, i, chord.size()));
                }
                if !is_canonical(chord, self.edo) {
                    return Err(format!("entry ({}, {}) is not canonical", s, i));
                }
            }
            if let Some(i) = list.windows(2).position(|w| w[0] >= w[1]) {
                return Err(format!("size {} is not strictly increasing at index {}", s, i + 1));
            }
        }
        if self.sizes[0].len() != 1 || self.sizes[n].len() != 1 {
            return Err("sizes 0 and N must hold exactly one entry".into());
        }
        let expected = necklace_count(self.edo);
        if BigUint::from(self.total()) != expected {
            return Err(format!("expected {} necklaces, found {}", expected, self.total()));
        }
        Ok(())
    }
}

fn check_budget(edo: Edo, config: &CatalogConfig) -> Result<()> {
    if config.max_work == u64::MAX {
        return Ok(());
    }
    let work = BigUint::from(1u8) << edo.get();
    if work > BigUint::from(config.max_work) {
        return Err(Error::ResourceExhausted {
            edo: edo.get(),
            reason: format!("{} canonicalizations exceed the budget of {}", work, config.max_work),
        });
    }
    Ok(())
}

fn check_time(edo: Edo, start: Instant, config: &CatalogConfig) -> Result<()> {
    if let Some(limit) = config.time_limit {
        if start.elapsed() > limit {
            return Err(Error::ResourceExhausted {
                edo: edo.get(),
                reason: format!("build exceeded the time limit of {:?}", limit),
            });
        }
    }
    Ok(())
}

/// Number of binary necklaces of length `N`.
///
/// ```text
/// (1/N) * sum over d | N of phi(d) * 2^(N/d)
/// ```
///
/// By convention there is one necklace (the empty string) of length `0`.
pub fn necklace_count(edo: Edo) -> BigUint {
    let n = edo.get();
    if n == 0 {
        return BigUint::from(1u8);
    }
    let mut sum = BigUint::ZERO;
    for d in (1..=n).filter(|d| n % d == 0) {
        sum += BigUint::from(totient(d)) << (n / d);
    }
    sum / n
}

/// Euler's totient function.
fn totient(mut n: u32) -> u32 {
    let mut result = n;
    let mut p = 2;
    while p * p <= n {
        if n % p == 0 {
            while n % p == 0 {
                n /= p;
            }
            result -= result / p;
        }
        p += 1;
    }
    if n > 1 {
        result -= result / n;
    }
    result
}

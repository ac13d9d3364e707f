//! Type-safe wrappers for cycle lengths, chords and selection layers.
//!
//! A [`Chord`] is a plain bit mask and carries no length of its own: every
//! operation that needs the cycle length takes an [`Edo`] alongside it.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cycle length `N` (equal divisions of the octave).
///
/// # Invariants
///
/// - `N <= 64`, the width of a [`Chord`] mask
/// - `N == 0` and `N == 1` are valid degenerate cycles
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Edo(u32);

impl Edo {
    /// Largest supported cycle length.
    pub const MAX: u32 = 64;

    /// Creates a new cycle length, rejecting values wider than a mask.
    pub fn new(n: u32) -> Result<Self> {
        if n > Self::MAX {
            return Err(Error::InvalidInput(format!(
                "edo {} exceeds the maximum of {}",
                n,
                Self::MAX
            )));
        }
        Ok(Edo(n))
    }

    /// Creates a cycle length for a request boundary, where `N = 0` is rejected.
    pub fn positive(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidInput("edo must be positive".into()));
        }
        Self::new(n)
    }

    /// Returns the raw cycle length.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns the cycle length as `usize`.
    pub fn len(self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Mask with all `N` bits set.
    pub fn full_mask(self) -> u64 {
        if self.0 == 64 {
            u64::MAX
        } else {
            (1u64 << self.0) - 1
        }
    }

    /// Reduces a signed step to `[0, N)`. Every step is `0` when `N == 0`.
    pub fn reduce(self, step: i64) -> u32 {
        if self.0 == 0 {
            0
        } else {
            step.rem_euclid(self.0 as i64) as u32
        }
    }
}

impl fmt::Display for Edo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-edo", self.0)
    }
}

impl TryFrom<u32> for Edo {
    type Error = Error;

    fn try_from(n: u32) -> Result<Self> {
        Edo::new(n)
    }
}

impl From<Edo> for u32 {
    fn from(edo: Edo) -> Self {
        edo.0
    }
}

/// A subset of the `N` cyclic positions.
///
/// Bit `i` of the mask is pitch class `i`. The bit-string form puts
/// pitch class `0` leftmost, so the mask value (the sort key for every sorted
/// list in this crate) is the reversed string read as a binary number.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chord(u64);

impl Chord {
    /// The chord with no pitch classes.
    pub const EMPTY: Chord = Chord(0);

    pub fn from_mask(mask: u64) -> Self {
        Chord(mask)
    }

    /// The chord containing every pitch class of `edo`.
    pub fn full(edo: Edo) -> Self {
        Chord(edo.full_mask())
    }

    /// Builds a chord from pitch classes, each taken modulo `N`.
    pub fn from_positions(edo: Edo, positions: impl IntoIterator<Item = u32>) -> Self {
        let mut mask = 0;
        if edo.is_empty() {
            return Chord(mask);
        }
        for p in positions {
            mask |= 1u64 << (p % edo.get());
        }
        Chord(mask)
    }

    pub fn mask(self) -> u64 {
        self.0
    }

    /// Number of pitch classes in the chord.
    pub fn size(self) -> u32 {
        self.0.count_ones()
    }

    pub fn contains(self, position: u32) -> bool {
        position < 64 && (self.0 >> position) & 1 == 1
    }

    pub fn with(self, position: u32) -> Self {
        Chord(self.0 | (1u64 << position))
    }

    pub fn without(self, position: u32) -> Self {
        Chord(self.0 & !(1u64 << position))
    }

    /// True if every pitch class of `other` is also in `self`.
    pub fn is_superset_of(self, other: Chord) -> bool {
        self.0 & other.0 == other.0
    }

    /// Iterates over the pitch classes in ascending order.
    pub fn positions(self) -> Positions {
        Positions { rest: self.0 }
    }

    /// Renders the chord as `N` characters of `0`/`1`, pitch class `0` first.
    pub fn to_bit_string(self, edo: Edo) -> String {
        (0..edo.get())
            .map(|i| if self.contains(i) { '1' } else { '0' })
            .collect()
    }

    /// Parses a bit string produced by [`Chord::to_bit_string`].
    pub fn parse_bits(s: &str) -> Result<(Edo, Self)> {
        let edo = Edo::new(s.len() as u32)?;
        let mut mask = 0u64;
        for (i, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => mask |= 1u64 << i,
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "invalid character {:?} in bit string {:?}",
                        c, s
                    )))
                }
            }
        }
        Ok((edo, Chord(mask)))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (k, p) in self.positions().enumerate() {
            if k > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "}}")
    }
}

/// Iterator over set pitch classes of a chord, lowest first.
pub struct Positions {
    rest: u64,
}

impl Iterator for Positions {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest == 0 {
            return None;
        }
        let p = self.rest.trailing_zeros();
        self.rest &= self.rest - 1; // Clear lowest set bit
        Some(p)
    }
}

/// One of the two user-controlled selection layers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Layer {
    First,
    Second,
}

impl Layer {
    /// Converts the `1`/`2` numbering used at request boundaries.
    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Layer::First),
            2 => Ok(Layer::Second),
            _ => Err(Error::InvalidInput(format!("layer must be 1 or 2, got {}", n))),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Layer::First => 1,
            Layer::Second => 2,
        }
    }
}

impl TryFrom<u8> for Layer {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self> {
        Layer::from_number(n)
    }
}

impl From<Layer> for u8 {
    fn from(layer: Layer) -> Self {
        layer.number()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer{}", self.number())
    }
}

//! Cyclic rotation and canonical necklace representatives.
//!
//! The canonical representative of a chord is the rotation whose bit string
//! (pitch class `0` leftmost) is lexicographically smallest. It is found with
//! Booth's least-rotation algorithm: a single pass over the doubled string
//! that maintains a KMP-style failure function, `O(N)` time and space.

use log::trace;

use crate::types::{Chord, Edo};

/// Canonical form of a chord.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Canonical {
    /// The lexicographically minimal rotation.
    pub representative: Chord,
    /// Left rotation in `[0, N)` taking the input to `representative`.
    pub offset: u32,
}

impl Canonical {
    /// Recovers the chord this canonical form was computed from.
    pub fn original(&self, edo: Edo) -> Chord {
        rotate_right(self.representative, self.offset as i64, edo)
    }
}

/// Rotates the bit string left by `step` positions.
///
/// Character `i` of the result is character `(i + step) mod N` of the input.
/// Negative steps rotate right. Bits at or above `N` are discarded.
pub fn rotate_left(chord: Chord, step: i64, edo: Edo) -> Chord {
    let n = edo.get();
    let mask = chord.mask() & edo.full_mask();
    let k = edo.reduce(step);
    if k == 0 {
        return Chord::from_mask(mask);
    }
    // Left in string order is towards the least significant bit.
    let rotated = (mask >> k) | (mask << (n - k));
    Chord::from_mask(rotated & edo.full_mask())
}

/// Rotates the bit string right by `step` positions.
pub fn rotate_right(chord: Chord, step: i64, edo: Edo) -> Chord {
    rotate_left(chord, -(edo.reduce(step) as i64), edo)
}

/// Iterates over all `N` rotations of a chord, starting with the chord itself.
///
/// Symmetric chords repeat; nothing is deduplicated here. For `N = 0` the
/// only rotation is the identity.
pub fn rotations(chord: Chord, edo: Edo) -> impl Iterator<Item = Chord> {
    (0..edo.get().max(1)).map(move |k| rotate_left(chord, k as i64, edo))
}

/// Computes the canonical representative and its rotation offset.
///
/// For `N = 0` the result is the empty chord with offset `0`. All-zero and
/// all-one chords are their own representative, offset `0`.
pub fn canonicalize(chord: Chord, edo: Edo) -> Canonical {
    let n = edo.len();
    if n == 0 {
        return Canonical {
            representative: Chord::EMPTY,
            offset: 0,
        };
    }
    let bits: Vec<u8> = (0..edo.get()).map(|i| chord.contains(i) as u8).collect();
    let start = least_rotation(&bits) as u32;
    let representative = rotate_left(chord, start as i64, edo);
    // Periodic chords reach the representative from several offsets; report the smallest.
    let offset = start % period(representative, edo);
    trace!("canonicalize({}) = {} by {}", chord, representative, offset);
    Canonical { representative, offset }
}

/// Returns just the canonical representative.
pub fn representative(chord: Chord, edo: Edo) -> Chord {
    canonicalize(chord, edo).representative
}

/// True if `chord` is its own canonical representative.
pub fn is_canonical(chord: Chord, edo: Edo) -> bool {
    representative(chord, edo) == Chord::from_mask(chord.mask() & edo.full_mask())
}

/// Smallest `p > 0` with `rotate_left(chord, p) == chord`; `N` for aperiodic chords.
pub fn period(chord: Chord, edo: Edo) -> u32 {
    let n = edo.get();
    (1..n)
        .filter(|p| n % p == 0)
        .find(|&p| rotate_left(chord, p as i64, edo) == chord)
        .unwrap_or(n.max(1))
}

/// Booth's algorithm: start index of the lexicographically least rotation.
///
/// Ties (periodic strings) resolve to the smallest such index.
fn least_rotation(s: &[u8]) -> usize {
    let n = s.len();
    if n == 0 {
        return 0;
    }
    let at = |i: usize| s[i % n];

    let mut f = vec![-1isize; 2 * n];
    let mut k = 0usize;
    for j in 1..2 * n {
        let sj = at(j);
        let mut i = f[j - k - 1];
        while i != -1 && sj != at(k + i as usize + 1) {
            if sj < at(k + i as usize + 1) {
                k = j - i as usize - 1;
            }
            i = f[i as usize];
        }
        if i == -1 && sj != at(k) {
            if sj < at(k) {
                k = j;
            }
            f[j - k] = -1;
        } else {
            f[j - k] = i + 1;
        }
    }
    k % n
}

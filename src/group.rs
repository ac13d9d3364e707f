//! Transformation pipeline: from a declarative group configuration to a
//! concrete set of chords.
//!
//! The stages run in a fixed order:
//!
//! 1. **Seed**: every catalog entry of the requested sizes, plus specific
//!    `(size, index)` entries.
//! 2. **Rotation**: the [`RotationPolicy`] maps the seed to a new set.
//! 3. **Interval substitution**: for each step `d`, every set pitch class is
//!    moved by `+d` and by `-d` onto an empty position; the results are added
//!    next to the chords they came from.
//!
//! Output chords are not canonicalized; rotations of the same necklace are
//! expected to appear side by side.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::rotation::{representative, rotate_left, rotations};
use crate::types::{Chord, Edo};

/// A set of (possibly non-canonical) chords, iterated in ascending mask order.
pub type ChordSet = BTreeSet<Chord>;

/// What the rotation stage does with the seed.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "steps")]
pub enum RotationPolicy {
    /// Leave the seed as it is.
    NoRotation,
    /// Replace every chord by its full orbit of `N` rotations. Groups that
    /// name no policy get this one.
    #[default]
    AllRotations,
    /// Rotate every chord left by one step; cardinality is preserved.
    Step(i64),
    /// Union of the rotations by each step. An empty list clears the set,
    /// a single step behaves exactly like [`RotationPolicy::Step`].
    Steps(Vec<i64>),
}

impl RotationPolicy {
    pub fn apply(&self, chords: &ChordSet, edo: Edo) -> ChordSet {
        match self {
            RotationPolicy::NoRotation => chords.clone(),
            RotationPolicy::AllRotations => chords.iter().flat_map(|&c| rotations(c, edo)).collect(),
            RotationPolicy::Step(step) => rotate_all(chords, *step, edo),
            RotationPolicy::Steps(steps) => match steps.as_slice() {
                [] => ChordSet::new(),
                [step] => rotate_all(chords, *step, edo),
                steps => steps.iter().flat_map(|&step| rotate_all(chords, step, edo)).collect(),
            },
        }
    }
}

/// Rotates every chord left by `step`.
pub fn rotate_all(chords: &ChordSet, step: i64, edo: Edo) -> ChordSet {
    chords.iter().map(|&c| rotate_left(c, step, edo)).collect()
}

/// Declarative description of one chord group.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Sizes whose whole catalog list is included.
    pub sizes: BTreeSet<usize>,
    /// Individual catalog entries, as `(size, index)`.
    pub entries: BTreeSet<(usize, usize)>,
    pub rotation: RotationPolicy,
    /// Interval-substitution step distances; empty disables the stage.
    pub intervals: BTreeSet<i64>,
}

impl GroupConfig {
    pub fn with_sizes(mut self, sizes: impl IntoIterator<Item = usize>) -> Self {
        self.sizes.extend(sizes);
        self
    }

    pub fn with_entries(mut self, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        self.entries.extend(entries);
        self
    }

    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_intervals(mut self, intervals: impl IntoIterator<Item = i64>) -> Self {
        self.intervals.extend(intervals);
        self
    }

    /// Runs the full pipeline against `catalog`.
    pub fn build(&self, catalog: &Catalog) -> Result<ChordSet> {
        let edo = catalog.edo();
        let seed = self.seed(catalog)?;
        debug!("seed: {} chords", seed.len());
        let rotated = self.rotation.apply(&seed, edo);
        debug!("after {:?}: {} chords", self.rotation, rotated.len());
        let expanded = expand_intervals(&rotated, &self.intervals, edo);
        debug!("after intervals {:?}: {} chords", self.intervals, expanded.len());
        Ok(expanded)
    }

    /// The union of the requested sizes and specific entries.
    pub fn seed(&self, catalog: &Catalog) -> Result<ChordSet> {
        let mut seed = ChordSet::new();
        for &size in &self.sizes {
            let list = catalog.size(size).ok_or_else(|| {
                Error::InvalidInput(format!("size {} is outside [0, {}]", size, catalog.edo().get()))
            })?;
            seed.extend(list.iter().copied());
        }
        for &(size, index) in &self.entries {
            seed.insert(catalog.entry(size, index)?);
        }
        Ok(seed)
    }
}

/// Adds every single-step interval substitution of every chord.
///
/// For each step `d` and direction `±d`, each set pitch class `p` whose
/// target `(p ± d) mod N` is empty yields the chord with `p` moved there.
/// Occupied targets yield nothing. The input chords are kept.
pub fn expand_intervals(chords: &ChordSet, steps: &BTreeSet<i64>, edo: Edo) -> ChordSet {
    let mut result = chords.clone();
    if steps.is_empty() {
        return result;
    }
    for &chord in chords {
        for &step in steps {
            for direction in [step, -step] {
                result.extend(substitutions(chord, direction, edo));
            }
        }
    }
    result
}

/// Chords reachable by moving one pitch class of `chord` by `step`.
pub fn substitutions(chord: Chord, step: i64, edo: Edo) -> impl Iterator<Item = Chord> {
    let n = edo.get();
    let shift = edo.reduce(step);
    let chord = Chord::from_mask(chord.mask() & edo.full_mask());
    chord.positions().filter_map(move |p| {
        let target = (p + shift) % n;
        if chord.contains(target) {
            None
        } else {
            Some(chord.without(p).with(target))
        }
    })
}

/// Replaces every chord by its canonical representative.
pub fn canonicalize_all(chords: &ChordSet, edo: Edo) -> ChordSet {
    chords.iter().map(|&c| representative(c, edo)).collect()
}

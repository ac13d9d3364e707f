//! Set filter: keeps or drops chords of one group by sub-mask containment of
//! the chords of another group.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::group::ChordSet;
use crate::types::Chord;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Keep chords that contain every secondary chord.
    #[default]
    RequireSuperset,
    /// Keep chords that contain no secondary chord.
    ForbidSuperset,
}

impl FilterMode {
    /// Whether `chord` passes against `secondary`. An empty `secondary` passes everything.
    pub fn accepts(self, chord: Chord, secondary: &ChordSet) -> bool {
        match self {
            FilterMode::RequireSuperset => secondary.iter().all(|&s| chord.is_superset_of(s)),
            FilterMode::ForbidSuperset => !secondary.iter().any(|&s| chord.is_superset_of(s)),
        }
    }
}

pub fn filter_chords(primary: &ChordSet, secondary: &ChordSet, mode: FilterMode) -> ChordSet {
    let result: ChordSet = primary.iter().copied().filter(|&c| mode.accepts(c, secondary)).collect();
    debug!(
        "filter {:?}: {} of {} chords pass against {}",
        mode,
        result.len(),
        primary.len(),
        secondary.len()
    );
    result
}

/// Complement of `filtered` within `primary`.
///
/// When the filter removed nothing, `primary` is returned unchanged instead
/// of the empty set.
pub fn apply_inversion(primary: &ChordSet, filtered: &ChordSet) -> ChordSet {
    if primary == filtered {
        return primary.clone();
    }
    primary.difference(filtered).copied().collect()
}

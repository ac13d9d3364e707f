//! Display encodings for chord sets.
//!
//! Three styles are supported, each producing one string per chord:
//!
//! - [`Style::Actual`]: the bit string itself (`"100010010000"`), or the
//!   canonical bit string followed by `.` and the offset label
//!   (`"000010001001.8"`) when [`EncodeFlags::absolute_smallest`] is set.
//! - [`Style::Absolute`]: the labels of the set positions, highest first
//!   (`"740"`); with `absolute_smallest`, the positions of the canonical form
//!   followed by the offset (`"B84.8"`).
//! - [`Style::Relative`]: the cyclic gaps between the set positions of the
//!   canonical form, starting at its lowest position, with the wrap-around gap
//!   last, followed by the offset (`"435.8"`).
//!
//! Output lists are sorted by mask value. Labels come from [`crate::symbols`],
//! so values of 62 and above render as `(NN)`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::group::ChordSet;
use crate::rotation::{canonicalize, Canonical};
use crate::symbols::{parse_label, push_label};
use crate::types::{Chord, Edo};

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Actual,
    Absolute,
    Relative,
}

/// Rendering options (all off by default).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeFlags {
    /// Render `actual` and `absolute` from the canonical form plus offset.
    pub absolute_smallest: bool,
    /// Count a gap by the empty positions it spans, so adjacent pitches give `0`.
    pub reduce_simplify: bool,
    /// Omit the wrap-around gap in `relative`.
    pub truncate_relative: bool,
}

/// Encodes every chord, in ascending mask order.
pub fn encode(chords: &ChordSet, edo: Edo, style: Style, flags: EncodeFlags) -> Vec<String> {
    chords.iter().map(|&c| encode_chord(c, edo, style, flags)).collect()
}

pub fn encode_chord(chord: Chord, edo: Edo, style: Style, flags: EncodeFlags) -> String {
    let chord = Chord::from_mask(chord.mask() & edo.full_mask());
    match style {
        Style::Actual if flags.absolute_smallest => {
            let canonical = canonicalize(chord, edo);
            let mut out = canonical.representative.to_bit_string(edo);
            push_offset(&mut out, &canonical);
            out
        }
        Style::Actual => chord.to_bit_string(edo),
        Style::Absolute if flags.absolute_smallest => {
            let canonical = canonicalize(chord, edo);
            let mut out = absolute_positions(canonical.representative);
            push_offset(&mut out, &canonical);
            out
        }
        Style::Absolute => absolute_positions(chord),
        Style::Relative => {
            let canonical = canonicalize(chord, edo);
            let mut gaps = gap_lengths(canonical.representative, edo, flags.reduce_simplify);
            if flags.truncate_relative {
                gaps.pop();
            }
            let mut out = String::new();
            for gap in gaps {
                push_label(&mut out, gap as u64);
            }
            push_offset(&mut out, &canonical);
            out
        }
    }
}

fn push_offset(out: &mut String, canonical: &Canonical) {
    out.push('.');
    push_label(out, canonical.offset as u64);
}

fn absolute_positions(chord: Chord) -> String {
    let positions: Vec<u32> = chord.positions().collect();
    let mut out = String::new();
    for &p in positions.iter().rev() {
        push_label(&mut out, p as u64);
    }
    out
}

/// Distances between cyclically consecutive set positions, from the lowest
/// position; the last entry is the wrap-around gap back to the lowest.
///
/// With `simplify`, each distance counts only the empty positions in between.
pub fn gap_lengths(chord: Chord, edo: Edo, simplify: bool) -> Vec<u32> {
    let n = edo.get();
    let positions: Vec<u32> = Chord::from_mask(chord.mask() & edo.full_mask()).positions().collect();
    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return Vec::new();
    };
    let mut gaps: Vec<u32> = positions.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.push(first + n - last);
    if simplify {
        for gap in &mut gaps {
            *gap -= 1;
        }
    }
    gaps
}

/// A chord read back from its `actual` encoding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedChord {
    pub edo: Edo,
    /// The chord as written: canonical if `offset` is present.
    pub chord: Chord,
    pub offset: Option<u32>,
}

impl DecodedChord {
    /// The chord the encoding was produced from.
    pub fn original(&self) -> Chord {
        self.canonical().original(self.edo)
    }

    pub fn canonical(&self) -> Canonical {
        match self.offset {
            Some(offset) => Canonical {
                representative: self.chord,
                offset,
            },
            None => canonicalize(self.chord, self.edo),
        }
    }
}

/// Parses `"bits"` or `"bits.offset"` as produced by [`Style::Actual`].
///
/// An offset must describe a real canonical form: the bits are canonical and
/// the offset is the smallest one that reaches them.
pub fn decode_actual(s: &str) -> Result<DecodedChord> {
    let (bits, offset) = match s.split_once('.') {
        Some((bits, label)) => (bits, Some(parse_label(label)?)),
        None => (s, None),
    };
    let (edo, chord) = Chord::parse_bits(bits)?;
    let Some(offset) = offset else {
        return Ok(DecodedChord { edo, chord, offset: None });
    };

    let offset = u32::try_from(offset)
        .ok()
        .filter(|&k| k < edo.get().max(1))
        .ok_or_else(|| Error::InvalidInput(format!("offset {} out of range for {}", offset, edo)))?;
    let decoded = DecodedChord {
        edo,
        chord,
        offset: Some(offset),
    };
    if canonicalize(decoded.original(), edo) != decoded.canonical() {
        return Err(Error::InvalidInput(format!("{:?} is not a canonical form with its offset", s)));
    }
    Ok(decoded)
}

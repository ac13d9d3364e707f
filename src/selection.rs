//! Two boolean selection layers shaped like a catalog.
//!
//! Each layer holds one flag per catalog entry. Rows are packed into `u64`
//! words, one row per chord size.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::Layer;

/// A row of flags backed by a vector of u64 words.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FlagRow {
    /// Storage: each u64 holds 64 flags
    words: Vec<u64>,
    /// Number of flags in the row
    len: usize,
}

impl FlagRow {
    const BITS_PER_WORD: usize = 64;

    /// Creates a row of `len` cleared flags.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(Self::BITS_PER_WORD)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Returns the flag at `index`, or `None` past the end of the row.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        let (w, b) = Self::word_and_bit(index);
        Some((self.words[w] >> b) & 1 == 1)
    }

    /// Sets the flag at `index`, returning its previous value.
    pub fn set(&mut self, index: usize, value: bool) -> Option<bool> {
        let old = self.get(index)?;
        let (w, b) = Self::word_and_bit(index);
        if value {
            self.words[w] |= 1 << b;
        } else {
            self.words[w] &= !(1 << b);
        }
        Some(old)
    }

    /// Number of set flags.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the indices of set flags in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let b = rest.trailing_zeros() as usize;
                rest &= rest - 1; // Clear lowest set bit
                Some(w * Self::BITS_PER_WORD + b)
            })
        })
    }

    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i).unwrap_or(false)).collect()
    }

    pub fn from_bools(flags: &[bool]) -> Self {
        let mut row = Self::new(flags.len());
        for (i, &f) in flags.iter().enumerate() {
            if f {
                row.set(i, true);
            }
        }
        row
    }
}

/// Both selection layers for one catalog.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Selections {
    first: Vec<FlagRow>,
    second: Vec<FlagRow>,
}

impl Selections {
    /// All-false layers with the shape of `catalog`.
    pub fn for_catalog(catalog: &Catalog) -> Self {
        let rows: Vec<FlagRow> = catalog.counts().into_iter().map(FlagRow::new).collect();
        Self {
            first: rows.clone(),
            second: rows,
        }
    }

    /// Rebuilds layers from stored boolean grids, which must match `catalog`'s shape.
    pub fn from_grids(catalog: &Catalog, first: &[Vec<bool>], second: &[Vec<bool>]) -> std::result::Result<Self, String> {
        let shape = catalog.counts();
        for (layer, grid) in [(Layer::First, first), (Layer::Second, second)] {
            let grid_shape: Vec<usize> = grid.iter().map(Vec::len).collect();
            if grid_shape != shape {
                return Err(format!("{} has shape {:?}, catalog has {:?}", layer, grid_shape, shape));
            }
        }
        Ok(Self {
            first: first.iter().map(|row| FlagRow::from_bools(row)).collect(),
            second: second.iter().map(|row| FlagRow::from_bools(row)).collect(),
        })
    }

    pub fn layer(&self, layer: Layer) -> &[FlagRow] {
        match layer {
            Layer::First => &self.first,
            Layer::Second => &self.second,
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut [FlagRow] {
        match layer {
            Layer::First => &mut self.first,
            Layer::Second => &mut self.second,
        }
    }

    pub fn get(&self, layer: Layer, size: usize, index: usize) -> Option<bool> {
        self.layer(layer).get(size)?.get(index)
    }

    /// Sets one flag, returning the previous value.
    pub fn set(&mut self, layer: Layer, size: usize, index: usize, value: bool) -> Result<bool> {
        let row = self
            .layer_mut(layer)
            .get_mut(size)
            .ok_or(Error::IndexOutOfRange { size, index, len: 0 })?;
        let len = row.len();
        row.set(index, value).ok_or(Error::IndexOutOfRange { size, index, len })
    }

    /// The `(size, index)` pairs selected in `layer`, in catalog order.
    pub fn selected(&self, layer: Layer) -> Vec<(usize, usize)> {
        self.layer(layer)
            .iter()
            .enumerate()
            .flat_map(|(s, row)| row.iter_set().map(move |i| (s, i)))
            .collect()
    }

    /// One layer as a boolean grid.
    pub fn to_grid(&self, layer: Layer) -> Vec<Vec<bool>> {
        self.layer(layer).iter().map(FlagRow::to_bools).collect()
    }
}

/// Boolean grids as they cross the persistence and request boundaries.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectionGrids {
    pub layer1: Vec<Vec<bool>>,
    pub layer2: Vec<Vec<bool>>,
}

impl From<&Selections> for SelectionGrids {
    fn from(selections: &Selections) -> Self {
        Self {
            layer1: selections.to_grid(Layer::First),
            layer2: selections.to_grid(Layer::Second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogConfig;
    use crate::types::Edo;

    fn catalog(n: u32) -> Catalog {
        Catalog::build(Edo::new(n).unwrap(), &CatalogConfig::default()).unwrap()
    }

    #[test]
    fn test_flag_row() {
        let mut row = FlagRow::new(130);
        assert_eq!(row.count(), 0);
        assert_eq!(row.set(3, true), Some(false));
        assert_eq!(row.set(64, true), Some(false));
        assert_eq!(row.set(129, true), Some(false));
        assert_eq!(row.set(3, true), Some(true));
        assert_eq!(row.set(130, true), None);
        assert_eq!(row.count(), 3);
        assert_eq!(row.iter_set().collect::<Vec<_>>(), vec![3, 64, 129]);
        assert_eq!(row.set(64, false), Some(true));
        assert_eq!(row.get(64), Some(false));
        assert_eq!(row.get(200), None);
    }

    #[test]
    fn test_bools_round_trip() {
        let flags = vec![true, false, false, true, true];
        assert_eq!(FlagRow::from_bools(&flags).to_bools(), flags);
        assert!(FlagRow::new(0).is_empty());
    }

    #[test]
    fn test_shape_follows_catalog() {
        let c = catalog(6);
        let sel = Selections::for_catalog(&c);
        let grids = SelectionGrids::from(&sel);
        let shape: Vec<usize> = grids.layer1.iter().map(Vec::len).collect();
        assert_eq!(shape, c.counts());
        assert!(grids.layer1.iter().flatten().all(|&f| !f));
        assert_eq!(grids.layer1, grids.layer2);
    }

    #[test]
    fn test_layers_are_independent() {
        let c = catalog(6);
        let mut sel = Selections::for_catalog(&c);
        sel.set(Layer::First, 3, 1, true).unwrap();
        sel.set(Layer::Second, 2, 0, true).unwrap();
        sel.set(Layer::Second, 4, 2, true).unwrap();

        assert_eq!(sel.selected(Layer::First), vec![(3, 1)]);
        assert_eq!(sel.selected(Layer::Second), vec![(2, 0), (4, 2)]);
        assert_eq!(sel.get(Layer::First, 2, 0), Some(false));
    }

    #[test]
    fn test_set_out_of_range() {
        let c = catalog(4);
        let mut sel = Selections::for_catalog(&c);
        assert!(matches!(
            sel.set(Layer::First, 2, 2, true),
            Err(Error::IndexOutOfRange { size: 2, index: 2, len: 2 })
        ));
        assert!(matches!(sel.set(Layer::First, 9, 0, true), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_from_grids_checks_shape() {
        let c = catalog(4);
        let mut sel = Selections::for_catalog(&c);
        sel.set(Layer::Second, 2, 1, true).unwrap();
        let grids = SelectionGrids::from(&sel);
        assert_eq!(Selections::from_grids(&c, &grids.layer1, &grids.layer2).unwrap(), sel);

        let bad = vec![vec![false]; 5];
        assert!(Selections::from_grids(&c, &bad, &grids.layer2).is_err());
    }
}

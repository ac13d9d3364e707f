//! Request/response facade over the catalog cache and the pure pipeline stages.
//!
//! Every request type is `Serialize + Deserialize`, so the same structs can
//! serve as an RPC schema. Cycle lengths arrive as plain integers and are
//! checked here: `0` and values above 64 are rejected before any
//! combinatorics runs.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cache::CatalogCache;
use crate::catalog::CatalogConfig;
use crate::encode::{encode, EncodeFlags, Style};
use crate::error::{Error, Result, Synced};
use crate::filter::{apply_inversion, filter_chords, FilterMode};
use crate::group::{canonicalize_all, ChordSet, GroupConfig};
use crate::selection::SelectionGrids;
use crate::store::{MemoryStore, Store};
use crate::types::{Chord, Edo, Layer};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CatalogRequest {
    pub edo: u32,
}

/// One catalog size: its necklaces and both selection rows.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub necklaces: Vec<String>,
    pub layer1: Vec<bool>,
    pub layer2: Vec<bool>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub edo: u32,
    /// Indexed by chord size, `0..=edo`.
    pub sizes: Vec<SizeEntry>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ToggleSelection {
    pub edo: u32,
    pub layer: Layer,
    pub size: usize,
    pub index: usize,
    pub value: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BuildGroupRequest {
    pub edo: u32,
    #[serde(flatten)]
    pub group: GroupConfig,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub edo: u32,
    pub group1: GroupConfig,
    pub group2: GroupConfig,
    #[serde(default)]
    pub filter_mode: FilterMode,
    /// Replace the filtered set by its complement in group 1.
    #[serde(default)]
    pub invert: bool,
    /// Canonicalize every surviving chord.
    #[serde(default)]
    pub reduce_final_set: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub edo: u32,
    /// Bit strings of length `edo`, pitch class `0` first.
    pub chords: Vec<String>,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub flags: EncodeFlags,
}

pub struct Engine {
    cache: CatalogCache,
    /// Where the latest symbol list goes.
    symbols: Arc<dyn Store>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl Engine {
    /// An engine without durable storage; the symbol store lives in memory.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            cache: CatalogCache::new(config),
            symbols: Arc::new(MemoryStore::new()),
        }
    }

    /// An engine persisting both stores to `store`, restoring the last catalog.
    pub fn open(config: CatalogConfig, store: Arc<dyn Store>) -> Synced<Self> {
        let Synced { value: cache, store_error } = CatalogCache::open(config, Arc::clone(&store));
        Synced::with_error(Self { cache, symbols: store }, store_error)
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// The catalog for `edo` with both selection layers, building it if needed.
    pub fn catalog(&self, request: &CatalogRequest) -> Result<Synced<CatalogResponse>> {
        let edo = Edo::positive(request.edo)?;
        let snapshot = self.cache.get(edo)?;
        Ok(snapshot.map(|snapshot| {
            let grids = SelectionGrids::from(&snapshot.selections);
            let sizes = snapshot
                .catalog
                .sizes()
                .iter()
                .zip(grids.layer1)
                .zip(grids.layer2)
                .map(|((list, layer1), layer2)| SizeEntry {
                    necklaces: list.iter().map(|c| c.to_bit_string(edo)).collect(),
                    layer1,
                    layer2,
                })
                .collect();
            CatalogResponse { edo: edo.get(), sizes }
        }))
    }

    /// Sets one selection flag and persists it; returns the previous value.
    pub fn toggle_selection(&self, request: &ToggleSelection) -> Result<Synced<bool>> {
        let edo = Edo::positive(request.edo)?;
        self.cache
            .set_selection(edo, request.layer, request.size, request.index, request.value)
    }

    /// A group seeded with every entry selected in `layer`.
    pub fn group_from_layer(&self, edo: u32, layer: Layer) -> Result<GroupConfig> {
        let edo = Edo::positive(edo)?;
        Ok(GroupConfig::default().with_entries(self.cache.selected(edo, layer)?))
    }

    pub fn build_group(&self, request: &BuildGroupRequest) -> Result<ChordSet> {
        let edo = Edo::positive(request.edo)?;
        let catalog = self.cache.catalog(edo)?;
        request.group.build(&catalog)
    }

    /// Builds both groups, filters the first by the second, then optionally
    /// inverts and canonicalizes.
    pub fn compose(&self, request: &ComposeRequest) -> Result<ChordSet> {
        let edo = Edo::positive(request.edo)?;
        let catalog = self.cache.catalog(edo)?;
        let primary = request.group1.build(&catalog)?;
        let secondary = request.group2.build(&catalog)?;

        let filtered = filter_chords(&primary, &secondary, request.filter_mode);
        let mut result = if request.invert {
            apply_inversion(&primary, &filtered)
        } else {
            filtered
        };
        if request.reduce_final_set {
            result = canonicalize_all(&result, edo);
        }
        debug!("composed {} chords for {}", result.len(), edo);
        Ok(result)
    }

    /// Renders the chords and records the list in the symbol store.
    pub fn encode(&self, request: &EncodeRequest) -> Result<Synced<Vec<String>>> {
        let edo = Edo::positive(request.edo)?;
        let chords = parse_chords(&request.chords, edo)?;
        let symbols = encode(&chords, edo, request.style, request.flags);
        info!("Encoded {} chords as {:?}", symbols.len(), request.style);
        let store_error = self.symbols.save_symbols(&symbols).err();
        Ok(Synced::with_error(symbols, store_error))
    }

    /// The most recently encoded symbol list, if any.
    pub fn last_symbols(&self) -> Result<Option<Vec<String>>> {
        Ok(self.symbols.load_symbols()?)
    }
}

/// Parses bit strings that must all have length `edo`.
pub fn parse_chords(bits: &[String], edo: Edo) -> Result<ChordSet> {
    bits.iter()
        .map(|s| {
            let (n, chord) = Chord::parse_bits(s)?;
            if n != edo {
                return Err(Error::InvalidInput(format!("{:?} has length {}, expected {}", s, n.get(), edo.get())));
            }
            Ok(chord)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::group::RotationPolicy;

    fn strings(chords: &ChordSet, n: u32) -> Vec<String> {
        let edo = Edo::new(n).unwrap();
        chords.iter().map(|c| c.to_bit_string(edo)).collect()
    }

    #[test]
    fn test_catalog_response() {
        let engine = Engine::default();
        let response = engine.catalog(&CatalogRequest { edo: 4 }).unwrap();
        assert!(response.is_persisted());
        let response = response.into_inner();
        assert_eq!(response.sizes.len(), 5);
        assert_eq!(response.sizes[2].necklaces, vec!["0101", "0011"]);
        assert_eq!(response.sizes[2].layer1, vec![false, false]);
        assert_eq!(response.sizes[4].necklaces, vec!["1111"]);
    }

    #[test]
    fn test_rejects_bad_edo() {
        let engine = Engine::default();
        assert!(matches!(engine.catalog(&CatalogRequest { edo: 0 }), Err(Error::InvalidInput(_))));
        assert!(matches!(engine.catalog(&CatalogRequest { edo: 65 }), Err(Error::InvalidInput(_))));
        assert_eq!(engine.cache().builds(), 0);
    }

    #[test]
    fn test_toggle_and_group_from_layer() {
        let engine = Engine::default();
        let toggle = ToggleSelection {
            edo: 6,
            layer: Layer::Second,
            size: 3,
            index: 1,
            value: true,
        };
        assert!(!engine.toggle_selection(&toggle).unwrap().into_inner());
        assert!(engine.toggle_selection(&toggle).unwrap().into_inner());

        let response = engine.catalog(&CatalogRequest { edo: 6 }).unwrap().into_inner();
        assert!(response.sizes[3].layer2[1]);
        assert!(response.sizes[3].layer1.iter().all(|&f| !f));

        let group = engine.group_from_layer(6, Layer::Second).unwrap();
        assert_eq!(group.entries.into_iter().collect::<Vec<_>>(), vec![(3, 1)]);
        assert!(engine.group_from_layer(6, Layer::First).unwrap().entries.is_empty());
    }

    #[test]
    fn test_toggle_out_of_range() {
        let engine = Engine::default();
        let toggle = ToggleSelection {
            edo: 4,
            layer: Layer::First,
            size: 2,
            index: 5,
            value: true,
        };
        assert!(matches!(
            engine.toggle_selection(&toggle),
            Err(Error::IndexOutOfRange { size: 2, index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_build_group() {
        let engine = Engine::default();
        let request = BuildGroupRequest {
            edo: 5,
            group: GroupConfig::default()
                .with_sizes([2])
                .with_rotation(RotationPolicy::AllRotations),
        };
        assert_eq!(engine.build_group(&request).unwrap().len(), 10);

        let request = BuildGroupRequest {
            edo: 5,
            group: GroupConfig::default().with_entries([(2, 7)]),
        };
        assert!(matches!(engine.build_group(&request), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_compose() {
        let engine = Engine::default();
        // All triads of 6-edo, filtered by the dyad {0, 1}.
        let mut request = ComposeRequest {
            edo: 6,
            group1: GroupConfig::default()
                .with_sizes([3])
                .with_rotation(RotationPolicy::AllRotations),
            group2: GroupConfig::default()
                .with_entries([(2, 2)])
                .with_rotation(RotationPolicy::NoRotation),
            filter_mode: FilterMode::RequireSuperset,
            invert: false,
            reduce_final_set: false,
        };
        let dyad = engine.catalog(&CatalogRequest { edo: 6 }).unwrap().into_inner().sizes[2].necklaces[2].clone();
        assert_eq!(dyad, "000011");

        let kept = engine.compose(&request).unwrap();
        assert_eq!(kept.len(), 4);
        assert!(strings(&kept, 6).iter().all(|s| s.ends_with("11")));

        request.invert = true;
        let inverted = engine.compose(&request).unwrap();
        assert_eq!(inverted.len(), 20 - 4);
        assert!(inverted.is_disjoint(&kept));

        request.invert = false;
        request.reduce_final_set = true;
        let reduced = engine.compose(&request).unwrap();
        assert_eq!(strings(&reduced, 6), vec!["001101", "001011", "000111"]);
    }

    #[test]
    fn test_encode_records_symbols() {
        let engine = Engine::default();
        assert_eq!(engine.last_symbols().unwrap(), None);
        let request = EncodeRequest {
            edo: 3,
            chords: vec!["101".into(), "100".into()],
            style: Style::Actual,
            flags: EncodeFlags {
                absolute_smallest: true,
                ..EncodeFlags::default()
            },
        };
        let symbols = engine.encode(&request).unwrap().into_result().unwrap();
        assert_eq!(symbols, vec!["001.1", "011.1"]);
        assert_eq!(engine.last_symbols().unwrap(), Some(symbols));
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        let engine = Engine::default();
        let request = EncodeRequest {
            edo: 4,
            chords: vec!["101".into()],
            style: Style::Relative,
            flags: EncodeFlags::default(),
        };
        assert!(matches!(engine.encode(&request), Err(Error::InvalidInput(_))));
        assert_eq!(engine.last_symbols().unwrap(), None);
    }

    #[test]
    fn test_request_json() {
        let toggle: ToggleSelection =
            serde_json::from_str(r#"{"edo": 12, "layer": 2, "size": 3, "index": 0, "value": true}"#).unwrap();
        assert_eq!(toggle.layer, Layer::Second);
        assert!(serde_json::from_str::<ToggleSelection>(r#"{"edo": 12, "layer": 3, "size": 3, "index": 0, "value": true}"#).is_err());

        let request: BuildGroupRequest = serde_json::from_str(
            r#"{"edo": 5, "sizes": [2], "rotation": {"kind": "steps", "steps": [1, 2]}, "intervals": [1]}"#,
        )
        .unwrap();
        assert_eq!(request.group.rotation, RotationPolicy::Steps(vec![1, 2]));
        assert!(request.group.entries.is_empty());

        let compose: ComposeRequest = serde_json::from_str(r#"{"edo": 5, "group1": {"sizes": [1]}, "group2": {}}"#).unwrap();
        assert_eq!(compose.filter_mode, FilterMode::RequireSuperset);
        assert!(!compose.invert && !compose.reduce_final_set);
        assert_eq!(compose.group2.rotation, RotationPolicy::AllRotations);
    }

    #[test]
    fn test_request_without_rotation() {
        let engine = Engine::default();
        let request: BuildGroupRequest = serde_json::from_str(r#"{"edo": 5, "sizes": [2]}"#).unwrap();
        assert_eq!(request.group.rotation, RotationPolicy::AllRotations);
        assert_eq!(engine.build_group(&request).unwrap().len(), 10);
    }
}

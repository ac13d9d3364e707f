//! Durable storage for catalog state and the latest symbol list.
//!
//! Two logical stores are kept:
//!
//! - the **catalog store**: the most recent catalog (keyed by its `edo`) with
//!   both selection layers;
//! - the **symbol store**: the most recently produced list of display strings.
//!
//! [`JsonStore`] keeps each store as one JSON document in a directory.
//! Documents are written to a temporary file and renamed into place, so a
//! concurrent reader sees either the old or the new document, never a torn one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::catalog::Catalog;
use crate::error::StoreError;
use crate::selection::{SelectionGrids, Selections};
use crate::types::{Chord, Edo};

/// Persisted form of a catalog and its selection layers.
///
/// Necklaces are stored as bit strings (pitch class `0` first) so that other
/// processes can read them without knowing the mask convention.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub edo: Edo,
    pub necklaces: Vec<Vec<String>>,
    #[serde(flatten)]
    pub selections: SelectionGrids,
}

impl CatalogRecord {
    pub fn new(catalog: &Catalog, selections: &Selections) -> Self {
        let edo = catalog.edo();
        Self {
            edo,
            necklaces: catalog
                .sizes()
                .iter()
                .map(|list| list.iter().map(|c| c.to_bit_string(edo)).collect())
                .collect(),
            selections: SelectionGrids::from(selections),
        }
    }

    /// Parses and validates the record back into a catalog and its selections.
    pub fn restore(&self) -> Result<(Catalog, Selections), StoreError> {
        let mut sizes = Vec::with_capacity(self.necklaces.len());
        for list in &self.necklaces {
            let mut chords = Vec::with_capacity(list.len());
            for bits in list {
                let (edo, chord) = parse_stored_chord(bits)?;
                if edo != self.edo {
                    return Err(StoreError::Corrupt(format!("{:?} does not have length {}", bits, self.edo.get())));
                }
                chords.push(chord);
            }
            sizes.push(chords);
        }
        let catalog = Catalog::from_sizes(self.edo, sizes).map_err(StoreError::Corrupt)?;
        let selections = Selections::from_grids(&catalog, &self.selections.layer1, &self.selections.layer2)
            .map_err(StoreError::Corrupt)?;
        Ok((catalog, selections))
    }
}

fn parse_stored_chord(bits: &str) -> Result<(Edo, Chord), StoreError> {
    Chord::parse_bits(bits).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Backing storage for the catalog and symbol stores.
///
/// `save_*` must replace the stored document atomically.
pub trait Store: Send + Sync {
    fn load_catalog(&self) -> Result<Option<CatalogRecord>, StoreError>;
    fn save_catalog(&self, record: &CatalogRecord) -> Result<(), StoreError>;
    fn load_symbols(&self) -> Result<Option<Vec<String>>, StoreError>;
    fn save_symbols(&self, symbols: &[String]) -> Result<(), StoreError>;
}

/// Store backed by JSON files in a directory.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub const CATALOG_FILE: &'static str = "catalog.json";
    pub const SYMBOLS_FILE: &'static str = "symbols.json";

    /// Opens a store in `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_vec(value)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&content)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(name)).map_err(|e| e.error)?;
        debug!("wrote {} ({} bytes)", name, content.len());
        Ok(())
    }
}

impl Store for JsonStore {
    fn load_catalog(&self) -> Result<Option<CatalogRecord>, StoreError> {
        self.read(Self::CATALOG_FILE)
    }

    fn save_catalog(&self, record: &CatalogRecord) -> Result<(), StoreError> {
        self.write(Self::CATALOG_FILE, record)
    }

    fn load_symbols(&self) -> Result<Option<Vec<String>>, StoreError> {
        self.read(Self::SYMBOLS_FILE)
    }

    fn save_symbols(&self, symbols: &[String]) -> Result<(), StoreError> {
        self.write(Self::SYMBOLS_FILE, symbols)
    }
}

/// In-memory store, mainly for tests and embedding without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Mutex<Option<CatalogRecord>>,
    symbols: Mutex<Option<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Io(io::Error::other("memory store lock poisoned"))
}

impl Store for MemoryStore {
    fn load_catalog(&self) -> Result<Option<CatalogRecord>, StoreError> {
        Ok(self.catalog.lock().map_err(|_| poisoned())?.clone())
    }

    fn save_catalog(&self, record: &CatalogRecord) -> Result<(), StoreError> {
        *self.catalog.lock().map_err(|_| poisoned())? = Some(record.clone());
        Ok(())
    }

    fn load_symbols(&self) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.symbols.lock().map_err(|_| poisoned())?.clone())
    }

    fn save_symbols(&self, symbols: &[String]) -> Result<(), StoreError> {
        *self.symbols.lock().map_err(|_| poisoned())? = Some(symbols.to_vec());
        Ok(())
    }
}

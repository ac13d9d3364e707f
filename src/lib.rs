//! # necklace-rs: binary necklaces over equal divisions of the octave
//!
//! **`necklace-rs`** enumerates, transforms, filters and labels subsets of the
//! `N` pitch classes of an `N`-tone equal temperament (`N`-edo), identified up
//! to rotation (transposition).
//!
//! ## Model
//!
//! A **chord** is a subset of the positions `0..N`, stored as a bit mask and
//! written as a bit string with pitch class `0` leftmost. Two chords that are
//! rotations of each other form one **necklace**; its **canonical
//! representative** is the lexicographically smallest rotation, and the
//! **offset** is the left rotation that takes a chord to it.
//!
//! The **catalog** for `N` lists every canonical necklace, grouped by size.
//! Groups of chords are described declaratively (catalog sizes and entries,
//! a rotation policy and interval substitutions), combined with a superset
//! filter and finally rendered as text.
//!
//! ## Basic Usage
//!
//! ```rust
//! use necklace_rs::engine::{CatalogRequest, EncodeRequest, Engine};
//! use necklace_rs::encode::{EncodeFlags, Style};
//!
//! let engine = Engine::default();
//!
//! // Necklace catalog of 4-edo: sizes 0..=4.
//! let catalog = engine.catalog(&CatalogRequest { edo: 4 }).unwrap().into_inner();
//! assert_eq!(catalog.sizes[2].necklaces, vec!["0101", "0011"]);
//!
//! // Canonical form plus offset of the chord "101" in 3-edo.
//! let symbols = engine
//!     .encode(&EncodeRequest {
//!         edo: 3,
//!         chords: vec!["101".to_string()],
//!         style: Style::Actual,
//!         flags: EncodeFlags { absolute_smallest: true, ..Default::default() },
//!     })
//!     .unwrap()
//!     .into_inner();
//! assert_eq!(symbols, vec!["011.1"]);
//! ```
//!
//! ## Core Components
//!
//! - **[`rotation`]**: rotation and canonicalization.
//! - **[`catalog`]**: the per-size necklace tables, built under a [`catalog::CatalogConfig`] budget.
//! - **[`cache`]**: the catalog cache with its selection layers and persistence.
//! - **[`group`]**, **[`filter`]**, **[`encode`]**: the chord pipeline.
//! - **[`engine`]**: request/response entry points tying it all together.

pub mod cache;
pub mod catalog;
pub mod combinations;
pub mod encode;
pub mod engine;
pub mod error;
pub mod filter;
pub mod group;
pub mod rotation;
pub mod selection;
pub mod store;
pub mod symbols;
pub mod types;

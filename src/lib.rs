//! 🎯 Dartdict: Double-ARray Trie DICTionary built from minimal DAWGs
//!
//! Dartdict is a library of static dictionaries mapping byte strings to 31-bit values.
//! Keys are packed into a compact double array of 32-bit units that supports fast
//! exact-match search, common-prefix search, and incremental traversal.
//! When values are given, keys are first compressed into a minimal DAWG
//! (directed acyclic word graph), so common suffixes are stored only once.
//!
//! # Examples
//!
//! ## Looking up an input key
//!
//! To get a value associated with an input key, use [`Dictionary::exact_match_search()`].
//!
//! ```
//! use dartdict::Dictionary;
//!
//! let keys = ["abc"];
//! let dict = Dictionary::from_records(&keys, &[4]).unwrap();
//!
//! assert_eq!(dict.exact_match_search("abc").map(|m| m.value()), Some(4));
//! assert_eq!(dict.exact_match_search("abd"), None);
//! ```
//!
//! ## Finding all occurrences of keys in an input text
//!
//! To search for keys that are prefixes of an input text,
//! use [`Dictionary::common_prefix_search()`] or [`Dictionary::common_prefix_iter()`].
//!
//! ```
//! use dartdict::Dictionary;
//!
//! let keys = ["京都", "東", "東京都"];
//! let dict = Dictionary::from_records(&keys, &[5963, 4649, 7676]).unwrap();
//!
//! let matches: Vec<_> = dict
//!     .common_prefix_search("東京都に行く")
//!     .into_iter()
//!     .map(|m| (m.value(), m.length()))
//!     .collect();
//!
//! assert_eq!(matches, vec![(4649, 3), (7676, 9)]);
//! ```
//!
//! ## Serializing and deserializing the data structure
//!
//! To serialize/deserialize the data structure into/from a byte sequence,
//! use [`Dictionary::serialize_to_vec`]/[`Dictionary::deserialize_from_slice`].
//! [`Dictionary::save`] and [`Dictionary::load`] do the same through files.
//!
//! ```
//! use dartdict::Dictionary;
//!
//! let keys = ["世界", "世界中", "国民"];
//! let dict = Dictionary::from_keys(&keys).unwrap();
//!
//! let bytes = dict.serialize_to_vec();
//! let other = Dictionary::deserialize_from_slice(&bytes).unwrap();
//!
//! assert_eq!(dict.as_units(), other.as_units());
//! ```
#![deny(missing_docs)]

#[cfg(target_pointer_width = "16")]
compile_error!("`target_pointer_width` must be larger than or equal to 32");

mod bit_vector;
mod builder;
pub mod dictionary;
pub mod errors;
mod keyset;
pub mod unit;
mod utils;

pub(crate) const BLOCK_SIZE: u32 = 256;

/// The maximum value that can be associated with a key.
pub const MAX_VALUE: u32 = 0x7fff_ffff;

pub use builder::DictionaryBuilder;
pub use dictionary::{CommonPrefixSearchIter, Dictionary, PrefixMatches, Traverse};
pub use unit::Unit;

/// Result of search.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    value: u32,
    length: usize,
}

impl Match {
    /// Value associated with the matched key.
    #[inline(always)]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Length of the matched key in bytes.
    #[inline(always)]
    pub const fn length(&self) -> usize {
        self.length
    }
}

/// Trait to show statistics of a data structure.
pub trait Statistics {
    /// Returns the total amount of heap used by the data structure in bytes.
    fn heap_bytes(&self) -> usize;

    /// Returns the number of units.
    fn num_elems(&self) -> usize;

    /// Returns the number of units unreachable from the root.
    fn num_vacants(&self) -> usize;

    /// Returns the ratio of vacant units.
    fn vacant_ratio(&self) -> f64 {
        self.num_vacants() as f64 / self.num_elems() as f64
    }
}

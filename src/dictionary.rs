//! A double-array dictionary of byte strings.
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::builder::DictionaryBuilder;
use crate::errors::{DartError, Result};
use crate::unit::Unit;
use crate::{Match, Statistics, BLOCK_SIZE};

// Root offsets are found in the first block and its neighbor.
const MAX_ROOT_OFFSET: u32 = 2 * BLOCK_SIZE;

/// A static dictionary mapping byte strings to 31-bit values.
///
/// The whole dictionary is a flat array of 32-bit [`Unit`]s. A dictionary is never
/// modified after construction, so it can be shared by any number of readers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dictionary {
    units: Vec<Unit>,
}

impl Dictionary {
    /// Creates a new [`Dictionary`] from input keys.
    ///
    /// Values in `[0..n-1]` will be associated with keys in the lexicographical order,
    /// where `n` is the number of keys.
    ///
    /// # Arguments
    ///
    /// - `keys`: Sorted list of byte-string keys.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when
    ///
    /// - `keys` contains empty keys or keys with NUL bytes,
    /// - `keys` contains duplicate keys,
    /// - `keys` is not sorted, or
    /// - the scale of the resulting array exceeds the expected one.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let keys = ["世界", "世界中", "国民"];
    /// let dict = Dictionary::from_keys(&keys).unwrap();
    ///
    /// assert_eq!(dict.exact_match_search("世界中").map(|m| m.value()), Some(1));
    /// ```
    pub fn from_keys<K>(keys: &[K]) -> Result<Self>
    where
        K: AsRef<[u8]>,
    {
        DictionaryBuilder::new().build_from_keys(keys)
    }

    /// Creates a new [`Dictionary`] from input keys and values.
    ///
    /// Keys are compressed into a minimal DAWG before packing, so common suffixes
    /// with the same values are shared.
    ///
    /// # Arguments
    ///
    /// - `keys`: Sorted list of byte-string keys.
    /// - `values`: Values of the keys, each no greater than `0x7fffffff`.
    ///
    /// # Errors
    ///
    /// In addition to the cases of [`Dictionary::from_keys`], [`DartError`] will be
    /// returned when the lengths of `keys` and `values` differ, or a value is out of
    /// range.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let keys = ["京都", "東", "東京都"];
    /// let dict = Dictionary::from_records(&keys, &[5963, 4649, 7676]).unwrap();
    ///
    /// let matches: Vec<_> = dict
    ///     .common_prefix_search("東京都庁")
    ///     .iter()
    ///     .map(|m| (m.value(), m.length()))
    ///     .collect();
    /// assert_eq!(matches, vec![(4649, 3), (7676, 9)]);
    /// ```
    pub fn from_records<K>(keys: &[K], values: &[u32]) -> Result<Self>
    where
        K: AsRef<[u8]>,
    {
        DictionaryBuilder::new().build_from_records(keys, values)
    }

    pub(crate) fn from_built_units(units: Vec<Unit>) -> Self {
        debug_assert!(validate_units(&units).is_ok());
        Self { units }
    }

    /// Creates a [`Dictionary`] from units, checking the header.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when the number of units is not a positive
    /// multiple of 256 or the first units are malformed.
    pub fn from_units(units: Vec<Unit>) -> Result<Self> {
        validate_units(&units)?;
        Ok(Self { units })
    }

    /// Returns the units.
    pub fn as_units(&self) -> &[Unit] {
        &self.units
    }

    /// Returns the number of units.
    pub fn size(&self) -> usize {
        self.units.len()
    }

    /// Returns the size of a unit in bytes.
    pub const fn unit_size() -> usize {
        std::mem::size_of::<u32>()
    }

    /// Returns the size of the array in bytes.
    pub fn total_size(&self) -> usize {
        Self::unit_size() * self.size()
    }

    /// Returns a value associated with an input key if exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let dict = Dictionary::from_records(&["abc"], &[4]).unwrap();
    ///
    /// let m = dict.exact_match_search("abc").unwrap();
    /// assert_eq!((m.value(), m.length()), (4, 3));
    /// assert_eq!(dict.exact_match_search("ab"), None);
    /// ```
    #[inline(always)]
    pub fn exact_match_search<K>(&self, key: K) -> Option<Match>
    where
        K: AsRef<[u8]>,
    {
        self.exact_match_search_from(key, 0)
    }

    /// Returns a value associated with `key` appended to the state at `node_pos`.
    ///
    /// `node_pos` is a position obtained from [`Dictionary::traverse`], or 0 for the
    /// root.
    pub fn exact_match_search_from<K>(&self, key: K, node_pos: usize) -> Option<Match>
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        let mut node_idx = node_pos;
        let mut unit = self.unit(node_idx);
        for &c in key {
            node_idx ^= (unit.offset() ^ u32::from(c)) as usize;
            unit = self.unit(node_idx);
            if unit.label() != u32::from(c) {
                return None;
            }
        }
        if !unit.has_leaf() {
            return None;
        }
        let value = self.unit(node_idx ^ unit.offset() as usize).value();
        Some(Match {
            value,
            length: key.len(),
        })
    }

    /// Returns all keys that are prefixes of `key`, in ascending order of length.
    pub fn common_prefix_search<K>(&self, key: K) -> Vec<Match>
    where
        K: AsRef<[u8]>,
    {
        self.common_prefix_iter(key.as_ref()).collect()
    }

    /// Searches for prefixes of `key` from the state at `node_pos`, storing at most
    /// `max_results` matches.
    ///
    /// The search always runs over the whole key, so
    /// [`PrefixMatches::num_matches`] tells the number of all matches even when
    /// some of them are not stored.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let dict = Dictionary::from_keys(&["a", "ab", "abc"]).unwrap();
    ///
    /// let results = dict.common_prefix_search_with("abcd", Some(2), 0);
    /// assert_eq!(results.matches().len(), 2);
    /// assert_eq!(results.num_matches(), 3);
    /// assert!(results.is_truncated());
    /// ```
    pub fn common_prefix_search_with<K>(
        &self,
        key: K,
        max_results: Option<usize>,
        node_pos: usize,
    ) -> PrefixMatches
    where
        K: AsRef<[u8]>,
    {
        let max_results = max_results.unwrap_or(usize::MAX);
        let mut matches = vec![];
        let mut num_matches = 0;
        for m in self.common_prefix_iter_from(key.as_ref(), node_pos) {
            if num_matches < max_results {
                matches.push(m);
            }
            num_matches += 1;
        }
        PrefixMatches {
            matches,
            num_matches,
        }
    }

    /// Returns an iterator of keys that are prefixes of `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let keys = ["世界", "世界中", "世論調査", "統計調査"];
    /// let dict = Dictionary::from_keys(&keys).unwrap();
    ///
    /// let text = "世界中の統計世論調査".as_bytes();
    /// let mut matches = vec![];
    /// for i in 0..text.len() {
    ///     for m in dict.common_prefix_iter(&text[i..]) {
    ///         matches.push((m.value(), i, i + m.length()));
    ///     }
    /// }
    /// assert_eq!(matches, vec![(0, 0, 6), (1, 0, 9), (2, 18, 30)]);
    /// ```
    pub fn common_prefix_iter<'k>(&self, key: &'k [u8]) -> CommonPrefixSearchIter<'k, '_> {
        self.common_prefix_iter_from(key, 0)
    }

    /// Returns an iterator of keys that are prefixes of `key` appended to the state at
    /// `node_pos`.
    pub fn common_prefix_iter_from<'k>(
        &self,
        key: &'k [u8],
        node_pos: usize,
    ) -> CommonPrefixSearchIter<'k, '_> {
        CommonPrefixSearchIter {
            key,
            key_pos: 0,
            dict: self,
            node_idx: node_pos ^ self.unit(node_pos).offset() as usize,
        }
    }

    /// Traverses the dictionary along `key[*key_pos..]` from the state at `*node_pos`.
    ///
    /// On return, `node_pos` and `key_pos` point at the last state reached and the
    /// number of bytes consumed, so that another search can resume from there. When
    /// a transition is missing, they are left at the last successful step.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::{Dictionary, Traverse};
    ///
    /// let dict = Dictionary::from_keys(&["ab", "abc", "abd"]).unwrap();
    ///
    /// let (mut node_pos, mut key_pos) = (0, 0);
    /// assert_eq!(dict.traverse(b"ab", &mut node_pos, &mut key_pos), Traverse::Value(0));
    /// assert_eq!(key_pos, 2);
    ///
    /// // Probes suffixes without walking "ab" again.
    /// let (mut pos, mut kpos) = (node_pos, 0);
    /// assert_eq!(dict.traverse(b"d", &mut pos, &mut kpos), Traverse::Value(2));
    /// let (mut pos, mut kpos) = (node_pos, 0);
    /// assert_eq!(dict.traverse(b"e", &mut pos, &mut kpos), Traverse::Dead);
    /// assert_eq!(dict.traverse(b"", &mut node_pos, &mut 0), Traverse::Value(0));
    ///
    /// let (mut node_pos, mut key_pos) = (0, 0);
    /// assert_eq!(dict.traverse(b"a", &mut node_pos, &mut key_pos), Traverse::NoValue);
    /// ```
    pub fn traverse(&self, key: &[u8], node_pos: &mut usize, key_pos: &mut usize) -> Traverse {
        let mut node_idx = *node_pos;
        let mut unit = self.unit(node_idx);
        while *key_pos < key.len() {
            let c = u32::from(key[*key_pos]);
            node_idx ^= (unit.offset() ^ c) as usize;
            unit = self.unit(node_idx);
            if unit.label() != c {
                return Traverse::Dead;
            }
            *node_pos = node_idx;
            *key_pos += 1;
        }
        if !unit.has_leaf() {
            return Traverse::NoValue;
        }
        Traverse::Value(self.unit(node_idx ^ unit.offset() as usize).value())
    }

    /// Serializes the dictionary into a byte vector of little-endian units.
    ///
    /// # Examples
    ///
    /// ```
    /// use dartdict::Dictionary;
    ///
    /// let dict = Dictionary::from_keys(&["世界", "世界中", "国民"]).unwrap();
    ///
    /// let bytes = dict.serialize_to_vec();
    /// let other = Dictionary::deserialize_from_slice(&bytes).unwrap();
    ///
    /// assert_eq!(dict, other);
    /// ```
    pub fn serialize_to_vec(&self) -> Vec<u8> {
        let mut dest = Vec::with_capacity(self.total_size());
        for unit in &self.units {
            dest.extend_from_slice(&unit.raw().to_le_bytes());
        }
        dest
    }

    /// Deserializes a dictionary from a byte slice of little-endian units.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when the length is not a positive multiple of
    /// 1024 bytes or the first units are malformed.
    pub fn deserialize_from_slice(source: &[u8]) -> Result<Self> {
        let block_bytes = BLOCK_SIZE as usize * Self::unit_size();
        if source.is_empty() || source.len() % block_bytes != 0 {
            return Err(DartError::format(
                "the number of bytes must be a positive multiple of 1024.",
                None,
            ));
        }
        let units = source
            .chunks_exact(Self::unit_size())
            .map(|b| Unit::from_raw(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .collect();
        Self::from_units(units)
    }

    /// Writes the dictionary image to a writer.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when writing fails.
    pub fn write_to<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(&self.serialize_to_vec())
            .and_then(|_| wtr.flush())
            .map_err(DartError::stream)
    }

    /// Reads a dictionary image from a reader to its end.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when reading fails or the image is malformed.
    pub fn read_from<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut bytes = vec![];
        rdr.read_to_end(&mut bytes).map_err(DartError::stream)?;
        Self::deserialize_from_slice(&bytes)
    }

    /// Saves the dictionary image to a file.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when the file cannot be written.
    pub fn save<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| DartError::stream(e).in_file(path))?;
        self.write_to(BufWriter::new(file))
            .map_err(|e| e.in_file(path))?;
        tracing::debug!(path = %path.display(), num_units = self.size(), "dictionary saved");
        Ok(())
    }

    /// Loads a dictionary image from a file.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when the file cannot be read or is malformed.
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| DartError::stream(e).in_file(path))?;
        let dict = Self::deserialize_from_slice(&bytes).map_err(|e| e.in_file(path))?;
        tracing::debug!(path = %path.display(), num_units = dict.size(), "dictionary loaded");
        Ok(dict)
    }

    #[inline(always)]
    fn unit(&self, node_idx: usize) -> Unit {
        self.units.get(node_idx).copied().unwrap_or(Unit::DEAD)
    }

    /// Counts the units reachable from the root.
    fn num_reachables(&self) -> usize {
        let mut visited = vec![false; self.units.len()];
        let mut stack = vec![0];
        visited[0] = true;
        let mut num_reachables = 1;
        while let Some(node_idx) = stack.pop() {
            let unit = self.units[node_idx];
            let base = node_idx ^ unit.offset() as usize;
            if unit.has_leaf() && base < visited.len() && !visited[base] {
                visited[base] = true;
                num_reachables += 1;
            }
            for c in 1..=0xFF {
                let child_idx = base ^ c;
                if child_idx < visited.len()
                    && !visited[child_idx]
                    && self.units[child_idx].label() == c as u32
                {
                    visited[child_idx] = true;
                    num_reachables += 1;
                    stack.push(child_idx);
                }
            }
        }
        num_reachables
    }
}

impl Statistics for Dictionary {
    fn heap_bytes(&self) -> usize {
        self.units.capacity() * std::mem::size_of::<Unit>()
    }

    fn num_elems(&self) -> usize {
        self.units.len()
    }

    fn num_vacants(&self) -> usize {
        self.units.len() - self.num_reachables()
    }
}

/// Result of [`Dictionary::traverse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traverse {
    /// The whole key was consumed and the state has this value.
    Value(u32),
    /// The whole key was consumed but the state has no value.
    NoValue,
    /// A transition was missing.
    Dead,
}

impl Traverse {
    /// Returns the status code of the double-array family of tools: the value,
    /// `-1` for [`Traverse::NoValue`], or `-2` for [`Traverse::Dead`].
    pub const fn status(self) -> i64 {
        match self {
            Self::Value(value) => value as i64,
            Self::NoValue => -1,
            Self::Dead => -2,
        }
    }
}

/// Result of [`Dictionary::common_prefix_search_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefixMatches {
    matches: Vec<Match>,
    num_matches: usize,
}

impl PrefixMatches {
    /// Stored matches in ascending order of length.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Consumes the result and returns the stored matches.
    pub fn into_matches(self) -> Vec<Match> {
        self.matches
    }

    /// Number of all matches, including those not stored.
    pub const fn num_matches(&self) -> usize {
        self.num_matches
    }

    /// Checks if some matches were not stored.
    pub fn is_truncated(&self) -> bool {
        self.matches.len() < self.num_matches
    }
}

/// Iterator created by [`Dictionary::common_prefix_iter`].
pub struct CommonPrefixSearchIter<'k, 'd> {
    key: &'k [u8],
    key_pos: usize,
    dict: &'d Dictionary,
    node_idx: usize,
}

impl Iterator for CommonPrefixSearchIter<'_, '_> {
    type Item = Match;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        while self.key_pos < self.key.len() {
            let c = u32::from(self.key[self.key_pos]);
            self.node_idx ^= c as usize;
            let unit = self.dict.unit(self.node_idx);
            if unit.label() != c {
                self.key_pos = self.key.len();
                return None;
            }
            self.node_idx ^= unit.offset() as usize;
            self.key_pos += 1;

            if unit.has_leaf() {
                return Some(Match {
                    value: self.dict.unit(self.node_idx).value(),
                    length: self.key_pos,
                });
            }
        }
        None
    }
}

fn validate_units(units: &[Unit]) -> Result<()> {
    if units.is_empty() || units.len() % BLOCK_SIZE as usize != 0 {
        return Err(DartError::format(
            "the number of units must be a positive multiple of 256.",
            None,
        ));
    }

    let root = units[0];
    if root.label() != 0 || root.has_leaf() {
        return Err(DartError::format("invalid root unit.", Some(0)));
    }
    if root.offset() == 0 || root.offset() >= MAX_ROOT_OFFSET {
        return Err(DartError::format("invalid root offset.", Some(0)));
    }

    for (i, unit) in units.iter().enumerate().take(BLOCK_SIZE as usize).skip(1) {
        if unit.label() <= 0xFF && unit.offset() as usize >= units.len() {
            return Err(DartError::format("invalid offset.", Some(i)));
        }
    }
    Ok(())
}

//! Read-only view over input keys and values.
use crate::errors::{DartError, Result};
use crate::MAX_VALUE;

/// Sorted keys with optional parallel values.
///
/// When no values are given, the index of each key is its value.
pub(crate) struct Keyset<'a, K> {
    keys: &'a [K],
    values: Option<&'a [u32]>,
}

impl<'a, K> Keyset<'a, K>
where
    K: AsRef<[u8]>,
{
    pub fn new(keys: &'a [K], values: Option<&'a [u32]>) -> Result<Self> {
        if let Some(values) = values {
            if values.len() != keys.len() {
                return Err(DartError::input(
                    "the number of values must equal the number of keys.",
                ));
            }
        } else if keys.len() > MAX_VALUE as usize + 1 {
            return Err(DartError::scale("number of keys", MAX_VALUE + 1));
        }
        Ok(Self { keys, values })
    }

    #[inline(always)]
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    #[inline(always)]
    pub const fn has_values(&self) -> bool {
        self.values.is_some()
    }

    #[inline(always)]
    pub fn key(&self, i: usize) -> &[u8] {
        self.keys[i].as_ref()
    }

    /// Gets the byte at `depth` of the `i`-th key, or 0 past its end.
    #[inline(always)]
    pub fn key_byte(&self, i: usize, depth: usize) -> u8 {
        self.key(i).get(depth).copied().unwrap_or(0)
    }

    #[inline(always)]
    pub fn value(&self, i: usize) -> u32 {
        self.values.map_or(i as u32, |values| values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let keys = ["ab", "abc", "b"];
        let keyset = Keyset::new(&keys, None).unwrap();
        assert_eq!(keyset.num_keys(), 3);
        assert!(!keyset.has_values());
        assert_eq!(keyset.key(1), b"abc");
        assert_eq!(keyset.key_byte(0, 1), b'b');
        assert_eq!(keyset.key_byte(0, 2), 0);
        assert_eq!(keyset.value(2), 2);

        let values = [10, 20, 30];
        let keyset = Keyset::new(&keys, Some(&values)).unwrap();
        assert!(keyset.has_values());
        assert_eq!(keyset.value(2), 30);
    }

    #[test]
    fn test_value_count_mismatch() {
        let keys = ["a", "b"];
        let values = [1];
        assert!(Keyset::new(&keys, Some(&values)).is_err());
    }
}

/// Thomas Wang's 32-bit integer hash.
///
/// http://web.archive.org/web/20071223173210/http://www.concentric.net/~Ttwang/tech/inthash.htm
#[inline(always)]
pub const fn hash_u32(mut key: u32) -> u32 {
    key = (!key).wrapping_add(key << 15);
    key ^= key >> 12;
    key = key.wrapping_add(key << 2);
    key ^= key >> 4;
    key = key.wrapping_mul(2057);
    key ^= key >> 16;
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_hash_u32_is_bijective_on_sample() {
        let hashes: HashSet<u32> = (0..4096).map(|k| hash_u32(k << 20 | k)).collect();
        assert_eq!(hashes.len(), 4096);
    }

    #[test]
    fn test_hash_u32_mixes_high_bits() {
        assert_ne!(hash_u32(1 << 24) & 0xFFFF, hash_u32(2 << 24) & 0xFFFF);
    }
}

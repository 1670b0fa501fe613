//! 32-bit key hashes.
//!
//! The home bucket is taken from the *top* bits of the hash, so every
//! function here must mix entropy into the high half.

/// Hashes an arbitrary byte string.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    fold(xxhash_rust::xxh3::xxh3_64(bytes))
}

#[inline]
pub fn hash_u64(x: u64) -> u32 {
    fold(xxhash_rust::xxh3::xxh3_64(&x.to_le_bytes()))
}

#[inline]
pub fn hash_u32(x: u32) -> u32 {
    fold(xxhash_rust::xxh3::xxh3_64(&x.to_le_bytes()))
}

/// Hashes a float by its canonical bit pattern, see [`canonical_f64_bits`].
#[inline]
pub fn hash_f64(x: f64) -> u32 {
    hash_u64(canonical_f64_bits(x))
}

/// Bit pattern used for float key identity: `-0.0` maps to `0.0` and every
/// NaN maps to the same quiet NaN.
#[inline]
pub fn canonical_f64_bits(x: f64) -> u64 {
    if x == 0.0 {
        0
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

#[inline]
fn fold(h: u64) -> u32 {
    ((h >> 32) ^ h) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_canonicalization() {
        assert_eq!(hash_f64(0.0), hash_f64(-0.0));
        assert_eq!(hash_f64(f64::NAN), hash_f64(-f64::NAN));
        assert_eq!(canonical_f64_bits(1.5), 1.5f64.to_bits());
    }

    /// Invariant: small consecutive integers spread over the top bits.
    #[test]
    fn integer_hashes_use_high_bits() {
        let tops: std::collections::BTreeSet<u32> = (0u32..64).map(|i| hash_u32(i) >> 28).collect();
        assert!(tops.len() > 8, "top nibble poorly distributed: {tops:?}");
    }

    #[test]
    fn bytes_hash_is_deterministic() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }
}

//! Two-level integer hash used by both phases of CHD.
//!
//! Derived from Zi Long Tan's superfast hash; the seed selects one function
//! out of the family, the salt decorrelates independent builds.

const M: u64 = 0x880355f21e6d1965;

/// Compression step of the hash family.
#[inline]
pub(crate) fn mix(mut h: u64) -> u64 {
    h ^= h >> 23;
    h = h.wrapping_mul(0x2127599bf4325c37);
    h ^= h >> 47;
    h
}

/// Hashes `key` with `seed` and `salt` into `[0, m)`.
///
/// `m` must be a power of two; the caller guarantees this via [`nextpow2`].
#[inline]
pub(crate) fn rhash(seed: u32, key: u64, m: u64, salt: u64) -> u64 {
    let mut h = key;
    h = h.wrapping_mul(M);
    h ^= mix(salt);
    h = h.wrapping_mul(M);
    h ^= mix(u64::from(seed));
    h = h.wrapping_mul(M);
    mix(h) & (m - 1)
}

/// Returns the smallest power of two >= `n`, treating 0 as 1 so callers
/// always get a valid table size.
pub(crate) fn nextpow2(n: u64) -> u64 {
    n.max(1).next_power_of_two()
}

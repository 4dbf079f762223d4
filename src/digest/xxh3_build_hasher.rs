use std::hash::{BuildHasher, Hasher};

use xxhash_rust::xxh3::xxh3_64;

/// Hasher feeding XXH3 with the 8-byte key representation.
///
/// The crate's maps and sets are keyed by caller-supplied `u64` keys, which
/// may themselves be hashes; running them through XXH3 keeps bucket
/// distribution healthy even for clustered inputs.
#[derive(Default)]
pub struct Xxh3Hasher {
    hash: u64,
}

impl Hasher for Xxh3Hasher {
    fn write(&mut self, bytes: &[u8]) {
        self.hash = xxh3_64(bytes);
    }

    // The hot path: every map and set in this crate is keyed by u64, and
    // `u64::hash` lands here. Hash the little-endian bytes so the result
    // does not depend on host byte order.
    fn write_u64(&mut self, n: u64) {
        self.hash = xxh3_64(&n.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.hash
    }
}

/// `BuildHasher` for `HashMap`/`HashSet` keyed by `u64`.
#[derive(Default, Clone)]
pub struct Xxh3BuildHasher;

impl BuildHasher for Xxh3BuildHasher {
    type Hasher = Xxh3Hasher;

    fn build_hasher(&self) -> Self::Hasher {
        Xxh3Hasher::default()
    }
}

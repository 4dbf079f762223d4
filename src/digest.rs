//! Hashing utilities: the per-record keyed checksum and the hasher behind
//! the crate's `u64`-keyed maps.

mod record_mac;
pub(crate) use record_mac::record_checksum;

mod xxh3_build_hasher;
pub use xxh3_build_hasher::{Xxh3BuildHasher, Xxh3Hasher};

use rand::rngs::OsRng;
use rand::RngCore;

/// Fills `buf` from the operating system CSPRNG.
///
/// Panics if the CSPRNG is unavailable; salts and temp-file suffixes must
/// never fall back to something predictable.
pub(crate) fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// A random `u32` from the OS CSPRNG.
pub(crate) fn random_u32() -> u32 {
    OsRng.next_u32()
}

/// A random `u64` from the OS CSPRNG.
pub(crate) fn random_u64() -> u64 {
    OsRng.next_u64()
}

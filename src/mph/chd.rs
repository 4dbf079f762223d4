use std::io::Write;
use std::ops::Range;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::mph::hash::rhash;
use crate::mph::seed_table::{SeedBytes, SeedTable};
use crate::utils::u64_le_at;

/// Serialized header: version byte, seed-width byte, 6 reserved bytes,
/// 8 bytes of little-endian salt.
pub(crate) const CHD_HEADER_SIZE: usize = 16;
const CHD_VERSION: u8 = 1;

/// A frozen minimal perfect hash function over the key set it was built
/// from.
///
/// [`find`](Self::find) maps every key of the original set to a distinct
/// index in `[0, len())`. For any other key the result is an arbitrary
/// in-range index; callers that need rejection must store the key alongside
/// the slot and compare, which is exactly what [`DbReader`](crate::DbReader)
/// does.
///
/// `Chd` is immutable and can be shared freely across threads.
#[derive(Debug)]
pub struct Chd {
    seeds: SeedTable,
    salt: u64,
}

impl Chd {
    pub(crate) fn new(seeds: SeedTable, salt: u64) -> Self {
        Self { seeds, salt }
    }

    /// Returns the unique index for `key` within `[0, len())`.
    ///
    /// The result is meaningful only for keys that were part of the set the
    /// function was frozen from.
    #[inline]
    pub fn find(&self, key: u64) -> u64 {
        let m = self.seeds.len() as u64;
        let bucket = rhash(0, key, m, self.salt);
        rhash(self.seeds.seed(bucket), key, m, self.salt)
    }

    /// Length of the lookup table (a power of two >= the key count).
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.seeds.len() == 0
    }

    /// Physical seed width in bytes: 1, 2 or 4.
    pub fn seed_size(&self) -> u8 {
        self.seeds.seed_size()
    }

    /// Serializes the function into `w` and returns the number of bytes
    /// written: a 16-byte header followed by the seed table body.
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<usize> {
        let mut hdr = [0u8; CHD_HEADER_SIZE];
        hdr[0] = CHD_VERSION;
        hdr[1] = self.seeds.seed_size();
        hdr[8..16].copy_from_slice(&self.salt.to_le_bytes());
        w.write_all(&hdr)?;

        let body = self.seeds.as_bytes();
        w.write_all(body)?;
        Ok(CHD_HEADER_SIZE + body.len())
    }

    /// Reconstructs a function from a serialized buffer, copying the seed
    /// table into owned storage.
    pub fn unmarshal(buf: &[u8]) -> Result<Chd> {
        let (width, salt, body) = Self::split(buf)?;
        let bytes = SeedBytes::Owned(body.to_vec().into_boxed_slice());
        Ok(Chd::new(SeedTable::from_bytes(width, bytes)?, salt))
    }

    /// Reconstructs a function whose seed table reads directly out of the
    /// mapped region `range` of `mmap`, without copying.
    ///
    /// The header is decoded up front; seeds are decoded little-endian on
    /// each access, which keeps the mapping free of alignment and aliasing
    /// concerns.
    pub fn unmarshal_mmap(mmap: Arc<Mmap>, range: Range<usize>) -> Result<Chd> {
        let (width, salt, _) = Self::split(&mmap[range.clone()])?;
        let body = range.start + CHD_HEADER_SIZE..range.end;
        let bytes = SeedBytes::Mapped { mmap, range: body };
        Ok(Chd::new(SeedTable::from_bytes(width, bytes)?, salt))
    }

    /// Validates the serialized header and splits a buffer into
    /// `(seed width, salt, body)`.
    fn split(buf: &[u8]) -> Result<(u8, u64, &[u8])> {
        if buf.len() < CHD_HEADER_SIZE {
            return Err(Error::CorruptIndex("seed table shorter than its header"));
        }
        if buf[0] != CHD_VERSION {
            return Err(Error::UnsupportedVersion(buf[0]));
        }
        let width = buf[1];
        let salt = u64_le_at(&buf[8..16], 0);
        Ok((width, salt, &buf[CHD_HEADER_SIZE..]))
    }
}

use std::ops::Range;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::utils::{u16_le_at, u32_le_at};

/// Backing storage for a seed table.
///
/// Freshly frozen tables own their bytes; tables deserialized out of a
/// database file borrow a window of the shared mapping instead, so query
/// objects never copy the table.
pub(crate) enum SeedBytes {
    Owned(Box<[u8]>),
    Mapped { mmap: Arc<Mmap>, range: Range<usize> },
}

impl SeedBytes {
    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            SeedBytes::Owned(b) => b,
            SeedBytes::Mapped { mmap, range } => &mmap[range.clone()],
        }
    }
}

impl std::fmt::Debug for SeedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedBytes::Owned(b) => write!(f, "SeedBytes::Owned({} bytes)", b.len()),
            SeedBytes::Mapped { range, .. } => {
                write!(f, "SeedBytes::Mapped({}..{})", range.start, range.end)
            }
        }
    }
}

/// Per-bucket displacement seeds at the smallest width that fits the
/// largest seed the construction actually used.
///
/// Every accessor decodes little-endian explicitly, so the same code path
/// serves owned tables and tables read in place from a mapped file, on any
/// host endianness, with no alignment requirement on the mapping.
#[derive(Debug)]
pub(crate) enum SeedTable {
    U8(SeedBytes),
    U16(SeedBytes),
    U32(SeedBytes),
}

impl SeedTable {
    /// Packs freshly searched seeds at 1, 2 or 4 bytes per entry depending
    /// on `max`, the largest committed seed.
    pub(crate) fn compact(seeds: &[u32], max: u32) -> Self {
        if max < 256 {
            let bytes: Vec<u8> = seeds.iter().map(|&s| s as u8).collect();
            SeedTable::U8(SeedBytes::Owned(bytes.into_boxed_slice()))
        } else if max < 65_536 {
            let mut bytes = Vec::with_capacity(seeds.len() * 2);
            for &s in seeds {
                bytes.extend_from_slice(&(s as u16).to_le_bytes());
            }
            SeedTable::U16(SeedBytes::Owned(bytes.into_boxed_slice()))
        } else {
            let mut bytes = Vec::with_capacity(seeds.len() * 4);
            for &s in seeds {
                bytes.extend_from_slice(&s.to_le_bytes());
            }
            SeedTable::U32(SeedBytes::Owned(bytes.into_boxed_slice()))
        }
    }

    /// Wraps serialized seed bytes without copying.
    ///
    /// Fails with `CorruptIndex` when the body length is not a multiple of
    /// the seed width, and `UnsupportedVersion` for widths other than
    /// 1, 2 or 4.
    pub(crate) fn from_bytes(width: u8, bytes: SeedBytes) -> Result<Self> {
        let len = bytes.as_slice().len();
        match width {
            1 => Ok(SeedTable::U8(bytes)),
            2 if len % 2 == 0 => Ok(SeedTable::U16(bytes)),
            4 if len % 4 == 0 => Ok(SeedTable::U32(bytes)),
            2 | 4 => Err(Error::CorruptIndex(
                "seed body length is not a multiple of the seed width",
            )),
            _ => Err(Error::CorruptIndex("unknown seed width")),
        }
    }

    /// Seed stored at table index `i`.
    #[inline]
    pub(crate) fn seed(&self, i: u64) -> u32 {
        match self {
            SeedTable::U8(b) => u32::from(b.as_slice()[i as usize]),
            SeedTable::U16(b) => u32::from(u16_le_at(b.as_slice(), i as usize)),
            SeedTable::U32(b) => u32_le_at(b.as_slice(), i as usize),
        }
    }

    /// Number of seeds, which equals the MPHF table length `m`.
    pub(crate) fn len(&self) -> usize {
        match self {
            SeedTable::U8(b) => b.as_slice().len(),
            SeedTable::U16(b) => b.as_slice().len() / 2,
            SeedTable::U32(b) => b.as_slice().len() / 4,
        }
    }

    /// Physical width of one seed in bytes: 1, 2 or 4.
    pub(crate) fn seed_size(&self) -> u8 {
        match self {
            SeedTable::U8(_) => 1,
            SeedTable::U16(_) => 2,
            SeedTable::U32(_) => 4,
        }
    }

    /// Serialized body, exactly as stored on disk.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            SeedTable::U8(b) | SeedTable::U16(b) | SeedTable::U32(b) => b.as_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_selection_follows_max_seed() {
        let seeds = [1u32, 7, 250];
        assert_eq!(SeedTable::compact(&seeds, 250).seed_size(), 1);
        assert_eq!(SeedTable::compact(&seeds, 256).seed_size(), 2);
        assert_eq!(SeedTable::compact(&seeds, 65_535).seed_size(), 2);
        assert_eq!(SeedTable::compact(&seeds, 65_536).seed_size(), 4);
    }

    #[test]
    fn seeds_survive_compaction_at_every_width() {
        let seeds = [3u32, 0, 199, 42];
        for max in [199, 60_000, 100_000] {
            let t = SeedTable::compact(&seeds, max);
            assert_eq!(t.len(), seeds.len());
            for (i, &s) in seeds.iter().enumerate() {
                assert_eq!(t.seed(i as u64), s, "width {}", t.seed_size());
            }
        }
    }

    #[test]
    fn rejects_partial_bodies() {
        let odd = SeedBytes::Owned(vec![0u8; 7].into_boxed_slice());
        assert!(matches!(
            SeedTable::from_bytes(2, odd),
            Err(Error::CorruptIndex(_))
        ));

        let bad_width = SeedBytes::Owned(vec![0u8; 8].into_boxed_slice());
        assert!(matches!(
            SeedTable::from_bytes(3, bad_width),
            Err(Error::CorruptIndex(_))
        ));
    }
}

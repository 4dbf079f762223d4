use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use memmap2::{Mmap, MmapOptions};
use sha2::{Digest, Sha512_256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::db::header::{Header, HEADER_SIZE, TRAILER_SIZE};
use crate::digest::record_checksum;
use crate::error::{Error, Result};
use crate::mph::{Chd, CHD_HEADER_SIZE};
use crate::utils::{u32_le_at, u64_le_at};

const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Query interface over a frozen constant database.
///
/// `open` verifies the whole-metadata strong hash once, then memory-maps
/// the file and answers lookups through the embedded MPHF with a single
/// positioned read per cache miss. Per-record keyed checksums are checked
/// lazily, on the record actually read.
///
/// Lookups may run concurrently from any number of threads: the mapping,
/// the MPHF and the decoded header are immutable, record reads use
/// positioned I/O with no shared cursor, and the lookup cache sits behind
/// its own lock. Returned values are copies decoded from the record
/// stream, never aliases into the mapping.
///
/// Dropping the reader unmaps the file, closes it and frees the cache.
#[derive(Debug)]
pub struct DbReader {
    chd: Chd,
    mmap: Arc<Mmap>,
    file: File,
    cache: Mutex<LruCache<u64, Vec<u8>>>,
    salt: [u8; 16],
    slots: u64,
    /// Byte range of the offset+key table within the mapping.
    offsets: Range<usize>,
    /// Byte range of the value-length table within the mapping.
    vlens: Range<usize>,
}

impl DbReader {
    /// Opens a database previously produced by
    /// [`DbWriter`](crate::DbWriter) and verifies its metadata.
    ///
    /// Up to `cache_capacity` recently looked-up records are kept in
    /// memory; zero selects the default of 128.
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: usize) -> Result<DbReader> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let size = file.metadata()?.len();
        if size < (HEADER_SIZE + TRAILER_SIZE) as u64 {
            return Err(Error::CorruptIndex("file too small"));
        }

        let mut hdrb = [0u8; HEADER_SIZE];
        file.read_exact(&mut hdrb)?;
        let header = Header::decode(&hdrb, size)?;

        verify_metadata(&mut file, &hdrb, header.offtbl, size)?;

        // The strong hash vouches for the tables; this bound rechecks the
        // header against the actual file length before any slicing.
        let slots = header.nkeys;
        let tblsz = slots
            .checked_mul(8 + 8 + 4)
            .ok_or(Error::CorruptIndex("slot count overflow"))?;
        if size < (HEADER_SIZE + TRAILER_SIZE) as u64 + tblsz {
            return Err(Error::CorruptIndex(
                "offset table shorter than the slot count mandates",
            ));
        }

        let mmap = Arc::new(unsafe { MmapOptions::new().map(&file)? });

        let offtbl = header.offtbl as usize;
        let offsets = offtbl..offtbl + (slots as usize) * 16;
        let vlens = offsets.end..offsets.end + (slots as usize) * 4;
        let chd_start = (vlens.end + 7) & !7;
        let chd_end = size as usize - TRAILER_SIZE;
        if chd_start + CHD_HEADER_SIZE > chd_end {
            return Err(Error::CorruptIndex("no room for the seed table"));
        }
        let chd = Chd::unmarshal_mmap(Arc::clone(&mmap), chd_start..chd_end)?;
        if chd.len() as u64 != slots {
            return Err(Error::CorruptIndex(
                "seed table length does not match the slot count",
            ));
        }

        let capacity = if cache_capacity == 0 {
            DEFAULT_CACHE_CAPACITY
        } else {
            cache_capacity
        };
        let capacity = NonZeroUsize::new(capacity).expect("capacity is nonzero");

        debug!(path = %path.display(), slots, size, "opened constant database");

        Ok(DbReader {
            chd,
            mmap,
            file,
            cache: Mutex::new(LruCache::new(capacity)),
            salt: header.salt,
            slots,
            offsets,
            vlens,
        })
    }

    /// Number of index slots in the database (the MPHF table length).
    pub fn len(&self) -> usize {
        self.slots as usize
    }

    /// True when the database holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Looks up `key`, returning its value or `None` when the key is
    /// absent.
    ///
    /// Unreadable or corrupt records are also reported as `None`; use
    /// [`find`](Self::find) to distinguish them.
    pub fn lookup(&self, key: u64) -> Option<Vec<u8>> {
        self.find(key).ok()
    }

    /// Looks up `key`, distinguishing the failure modes.
    ///
    /// [`Error::KeyNotFound`] when the key was never stored,
    /// [`Error::RecordCorrupt`] when the stored record fails its keyed
    /// checksum, [`Error::Io`] when the read itself fails.
    pub fn find(&self, key: u64) -> Result<Vec<u8>> {
        if let Some(v) = self.lock_cache()?.get(&key) {
            return Ok(v.clone());
        }

        let i = self.chd.find(key);
        let table = &self.mmap[self.offsets.clone()];
        let stored_key = u64_le_at(table, (2 * i + 1) as usize);
        if stored_key != key {
            return Err(Error::KeyNotFound(key));
        }

        let off = u64_le_at(table, (2 * i) as usize);
        if off < HEADER_SIZE as u64 {
            // A zero pair marks a slot no key was mapped to; real records
            // always live past the header.
            return Err(Error::KeyNotFound(key));
        }
        let vlen = u32_le_at(&self.mmap[self.vlens.clone()], i as usize);

        let value = self.read_record(off, vlen)?;
        self.lock_cache()?.put(key, value.clone());
        Ok(value)
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, LruCache<u64, Vec<u8>>>> {
        self.cache
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("cache lock poisoned")))
    }

    /// Reads the record at `off`, verifies its keyed checksum and returns
    /// the value bytes.
    fn read_record(&self, off: u64, vlen: u32) -> Result<Vec<u8>> {
        let mut data = vec![0u8; vlen as usize + 8];
        read_exact_at(&self.file, &mut data, off)?;

        let stored = u64::from_be_bytes(data[..8].try_into().expect("8-byte prefix"));
        let expected = record_checksum(&self.salt, off, &data[8..]);
        if stored != expected {
            warn!(off, "record failed its keyed checksum");
            return Err(Error::RecordCorrupt(off));
        }

        data.drain(..8);
        Ok(data)
    }
}

/// Recomputes the SHA-512/256 over the header and the index region and
/// compares it against the trailer in constant time.
///
/// Leaves the file cursor wherever the trailer read put it; callers must
/// not rely on it.
fn verify_metadata(file: &mut File, hdrb: &[u8], offtbl: u64, size: u64) -> Result<()> {
    use std::io::{Seek, SeekFrom};

    let mut digest = Sha512_256::new();
    digest.update(hdrb);

    let remsz = size - offtbl - TRAILER_SIZE as u64;
    file.seek(SeekFrom::Start(offtbl))?;
    let copied = std::io::copy(&mut file.by_ref().take(remsz), &mut digest)?;
    if copied != remsz {
        return Err(Error::CorruptIndex("metadata region truncated"));
    }

    let mut expected = [0u8; TRAILER_SIZE];
    file.seek(SeekFrom::Start(size - TRAILER_SIZE as u64))?;
    file.read_exact(&mut expected)?;

    let actual = digest.finalize();
    if !bool::from(actual.as_slice().ct_eq(&expected)) {
        warn!("metadata checksum mismatch");
        return Err(Error::IntegrityError);
    }
    Ok(())
}

/// Positioned read with no shared cursor, so lookups never contend on a
/// seek position.
#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], off: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, off)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], off: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut pos = 0;
    while pos < buf.len() {
        let n = file.seek_read(&mut buf[pos..], off + pos as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "record extends past end of file",
            ));
        }
        pos += n;
    }
    Ok(())
}

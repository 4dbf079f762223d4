use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512_256};
use tracing::{debug, info};

use crate::db::header::{Header, HEADER_SIZE};
use crate::digest::{record_checksum, Xxh3BuildHasher};
use crate::error::{Error, Result};
use crate::mph::ChdBuilder;
use crate::utils::{fill_random, random_u32};

/// On-disk alignment of the index region. The reader maps the file from
/// offset zero and slices, so this does not have to match the host page
/// size; it only keeps the mapped tables page-aligned in the common case.
pub(crate) const PAGE_SIZE: u64 = 4096;

/// Location of one accepted record within the temp file.
struct ValueRef {
    off: u64,
    vlen: u32,
}

/// Streams key/value records into a temporary file and freezes them into
/// an immutable constant database.
///
/// Records are appended as they arrive; `freeze` builds the CHD function
/// over the accumulated keys, lays down the index tables and integrity
/// metadata, and atomically renames the temp file into place. Everything
/// before a successful rename is invisible to readers.
///
/// Dropping a writer that was never frozen removes the temp file.
pub struct DbWriter {
    file: Option<BufWriter<File>>,
    builder: ChdBuilder,
    keymap: HashMap<u64, ValueRef, Xxh3BuildHasher>,
    salt: [u8; 16],
    off: u64,
    path: PathBuf,
    tmp_path: PathBuf,
    frozen: bool,
}

impl DbWriter {
    /// Prepares `path` to hold a constant database.
    ///
    /// Writing happens in `<path>.tmp.<random>`; the final name appears
    /// only when [`freeze`](Self::freeze) succeeds.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<DbWriter> {
        let path = path.as_ref().to_path_buf();
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".tmp.{:08x}", random_u32()));
        let tmp_path = PathBuf::from(tmp);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        let mut file = BufWriter::new(file);

        // Reserve space for the header; it is finalized during freeze.
        file.write_all(&[0u8; HEADER_SIZE])?;

        let mut salt = [0u8; 16];
        fill_random(&mut salt);

        debug!(path = %path.display(), tmp = %tmp_path.display(), "created database writer");

        Ok(DbWriter {
            file: Some(file),
            builder: ChdBuilder::new(),
            keymap: HashMap::with_hasher(Xxh3BuildHasher),
            salt,
            off: HEADER_SIZE as u64,
            path,
            tmp_path,
            frozen: false,
        })
    }

    /// Number of distinct keys added so far.
    pub fn len(&self) -> usize {
        self.keymap.len()
    }

    /// True when no records have been added.
    pub fn is_empty(&self) -> bool {
        self.keymap.is_empty()
    }

    /// Appends one record.
    ///
    /// Fails with [`Error::DuplicateKey`] for a repeated key,
    /// [`Error::ValueTooLarge`] past 2^32 - 1 bytes, and [`Error::Frozen`]
    /// once the writer has been frozen or aborted. An I/O failure discards
    /// the temp file before the error is returned.
    pub fn add(&mut self, key: u64, value: &[u8]) -> Result<()> {
        if self.frozen || self.file.is_none() {
            return Err(Error::Frozen);
        }
        let vlen = value_len(value)?;
        if self.keymap.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }

        self.builder.add(key)?;
        let off = self.off;
        if let Err(e) = self.write_record(off, value) {
            self.discard();
            return Err(e.into());
        }
        self.keymap.insert(key, ValueRef { off, vlen });
        Ok(())
    }

    /// Appends a batch of records, skipping keys that are already present.
    ///
    /// Returns the number of records actually inserted. Any error other
    /// than a duplicate key stops the batch and is returned.
    pub fn add_many(&mut self, pairs: &[(u64, &[u8])]) -> Result<usize> {
        let mut inserted = 0;
        for &(key, value) in pairs {
            match self.add(key, value) {
                Ok(()) => inserted += 1,
                Err(Error::DuplicateKey(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }

    /// Builds the MPHF at the given load factor, writes the index region
    /// and integrity metadata, and renames the temp file into place.
    ///
    /// `load` must be in `(0, 1)`; values between 0.75 and 0.9 are a good
    /// trade between table size and construction effort. There is no
    /// built-in retry on [`Error::ConstructionFailed`] — rebuild with a
    /// lower load (a fresh writer draws a fresh salt). On any failure the
    /// temp file is removed and the writer becomes unusable.
    pub fn freeze(&mut self, load: f64) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        let file = self.file.take().ok_or(Error::Frozen)?;

        match self.freeze_inner(file, load) {
            Ok(file_size) => {
                self.frozen = true;
                info!(
                    path = %self.path.display(),
                    keys = self.keymap.len(),
                    file_size,
                    "froze constant database"
                );
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&self.tmp_path);
                Err(e)
            }
        }
    }

    /// Abandons the database: closes and removes the temp file.
    ///
    /// Harmless to call more than once or after `freeze`.
    pub fn abort(&mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }

    /// Record layout: 8-byte big-endian keyed checksum, then the raw
    /// value. Zero-length values keep the checksum so they round-trip
    /// with the same integrity guarantee as any other record.
    fn write_record(&mut self, off: u64, value: &[u8]) -> std::io::Result<()> {
        let file = self.file.as_mut().expect("checked by caller");
        let cksum = record_checksum(&self.salt, off, value);
        file.write_all(&cksum.to_be_bytes())?;
        file.write_all(value)?;
        self.off += 8 + value.len() as u64;
        Ok(())
    }

    fn freeze_inner(&mut self, mut file: BufWriter<File>, load: f64) -> Result<u64> {
        let chd = std::mem::take(&mut self.builder).freeze(load)?;
        let slots = chd.len();

        // The index region starts at the next page boundary so the mapped
        // tables sit page-aligned in a reader's address space.
        let offtbl = next_multiple(self.off, PAGE_SIZE);
        write_zeros(&mut file, offtbl - self.off)?;

        // Everything from the header through the serialized MPHF is
        // covered by one strong hash, verified once at open time.
        let header = Header {
            salt: self.salt,
            nkeys: slots as u64,
            offtbl,
        };
        let ehdr = header.encode();
        let mut digest = Sha512_256::new();
        digest.update(ehdr);

        let mut tee = HashingWriter {
            inner: &mut file,
            digest: &mut digest,
        };

        // Parallel tables indexed by the MPHF slot: (offset, key) pairs
        // and value lengths, little-endian for in-place reads off the
        // mapping. Slots no key maps to stay zero.
        let mut offsets = vec![0u8; slots * 16];
        let mut vlens = vec![0u8; slots * 4];
        for (&key, v) in &self.keymap {
            let i = chd.find(key) as usize;
            offsets[i * 16..i * 16 + 8].copy_from_slice(&v.off.to_le_bytes());
            offsets[i * 16 + 8..i * 16 + 16].copy_from_slice(&key.to_le_bytes());
            vlens[i * 4..i * 4 + 4].copy_from_slice(&v.vlen.to_le_bytes());
        }
        tee.write_all(&offsets)?;
        tee.write_all(&vlens)?;

        // Align the MPHF to the next 64-bit boundary.
        let off = offtbl + (slots as u64) * 20;
        let aligned = next_multiple(off, 8);
        tee.write_all(&vec![0u8; (aligned - off) as usize])?;

        let nw = chd.marshal(&mut tee)?;
        let file_size = aligned + nw as u64 + 32;

        // Trailer: the digest itself, excluded from what it covers.
        let cksum = digest.finalize();
        file.write_all(cksum.as_slice())?;

        // Now that every offset is final, go back and fill in the header.
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&ehdr)?;
        file.flush()?;

        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&self.tmp_path, &self.path)?;
        Ok(file_size)
    }
}

impl Drop for DbWriter {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Forwards writes to the file while folding the same bytes into the
/// strong hash.
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    digest: &'a mut Sha512_256,
}

impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write_all(buf)?;
        self.digest.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn value_len(value: &[u8]) -> Result<u32> {
    u32::try_from(value.len()).map_err(|_| Error::ValueTooLarge)
}

fn next_multiple(off: u64, align: u64) -> u64 {
    (off + align - 1) & !(align - 1)
}

fn write_zeros<W: Write>(w: &mut W, count: u64) -> std::io::Result<()> {
    if count > 0 {
        w.write_all(&vec![0u8; count as usize])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_len_bound() {
        assert_eq!(value_len(b"abc").unwrap(), 3);
        assert_eq!(value_len(b"").unwrap(), 0);
        // 2^32-1 is the largest encodable length; anything longer must be
        // rejected before any bytes hit the file. Checked via the length
        // math rather than a 4 GiB allocation.
        assert_eq!(u32::try_from((1u64 << 32) - 1).ok(), Some(u32::MAX));
        assert!(u32::try_from(1u64 << 32).is_err());
    }

    #[test]
    fn alignment_math() {
        assert_eq!(next_multiple(64, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(next_multiple(PAGE_SIZE, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(next_multiple(PAGE_SIZE + 1, PAGE_SIZE), 2 * PAGE_SIZE);
        assert_eq!(next_multiple(20, 8), 24);
        assert_eq!(next_multiple(24, 8), 24);
    }
}

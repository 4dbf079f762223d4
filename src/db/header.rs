use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// File magic, first four bytes of every database.
pub(crate) const MAGIC: [u8; 4] = *b"CHDB";

/// Fixed header size reserved at the front of the file.
pub(crate) const HEADER_SIZE: usize = 64;

/// SHA-512/256 trailer at the end of the file.
pub(crate) const TRAILER_SIZE: usize = 32;

/// Decoded 64-byte file header.
///
/// All multi-byte fields are big-endian on disk. The flags word is
/// reserved (a future keys-only variant); only zero is accepted.
///
/// ```text
/// 0   magic "CHDB"        4 bytes
/// 4   flags               u32, must be 0
/// 8   salt                16 random bytes, keys the record checksums
/// 24  nkeys               u64
/// 32  offtbl              u64, file offset of the index region
/// 40  reserved            zeros to byte 64
/// ```
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub(crate) salt: [u8; 16],
    pub(crate) nkeys: u64,
    pub(crate) offtbl: u64,
}

impl Header {
    /// Serializes the header into its fixed big-endian form.
    pub(crate) fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        // flags at 4..8 stay zero
        buf[8..24].copy_from_slice(&self.salt);
        BigEndian::write_u64(&mut buf[24..32], self.nkeys);
        BigEndian::write_u64(&mut buf[32..40], self.offtbl);
        buf
    }

    /// Decodes and validates a header read from a file of `file_size`
    /// bytes.
    ///
    /// `offtbl` must leave room for the header before it and the trailer
    /// after it; anything else means the file was truncated or rewritten.
    pub(crate) fn decode(buf: &[u8; HEADER_SIZE], file_size: u64) -> Result<Header> {
        if buf[..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        if BigEndian::read_u32(&buf[4..8]) != 0 {
            return Err(Error::CorruptIndex("nonzero header flags"));
        }

        let mut salt = [0u8; 16];
        salt.copy_from_slice(&buf[8..24]);
        let nkeys = BigEndian::read_u64(&buf[24..32]);
        let offtbl = BigEndian::read_u64(&buf[32..40]);

        if offtbl < HEADER_SIZE as u64 || offtbl >= file_size - TRAILER_SIZE as u64 {
            return Err(Error::CorruptIndex("index offset out of range"));
        }

        Ok(Header {
            salt,
            nkeys,
            offtbl,
        })
    }
}

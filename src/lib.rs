//! # chdb — Constant Key/Value Database
//!
//! This crate builds and queries read-only key/value databases whose index
//! is a minimal perfect hash function (CHD) over the key set. It offers:
//! - **Single-lookup retrieval** with no collision chains: the MPHF maps
//!   every stored key to a unique slot.
//! - **Zero-copy index access** using memory-mapped files.
//! - **Write-once immutability**: a frozen database never changes.
//! - **Layered integrity**: one strong hash over all metadata, verified at
//!   open, plus a keyed checksum per record, verified on read.
//!
//! ## Model
//!
//! Keys are `u64`; callers hash their native keys (strings, paths, blobs)
//! down to 64 bits with any good hash before storing. Values are arbitrary
//! byte sequences up to 2^32 - 1 bytes. The database is constructed once
//! through [`DbWriter`], frozen, and then served read-only through
//! [`DbReader`] from any number of threads.
//!
//! The MPHF layer is usable on its own through [`ChdBuilder`] and [`Chd`]
//! when only a perfect key-to-index mapping is needed.
//!
//! ## Example Usage
//! ```rust
//! use chdb::{DbReader, DbWriter};
//!
//! # fn main() -> chdb::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("geo.db");
//!
//! // Build: add records, then freeze at a load factor.
//! let mut writer = DbWriter::create(&path)?;
//! writer.add(0xfeed_0001, b"value one")?;
//! writer.add(0xfeed_0002, b"value two")?;
//! writer.freeze(0.9)?;
//!
//! // Query: open verifies integrity, lookups are constant time.
//! let reader = DbReader::open(&path, 0)?;
//! assert_eq!(reader.lookup(0xfeed_0001).as_deref(), Some(&b"value one"[..]));
//! assert_eq!(reader.lookup(0xdead_beef), None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability Notes
//! - The writer stages everything in a `<path>.tmp.<random>` file and
//!   renames it into place only after a successful freeze and fsync.
//! - A dropped or aborted writer removes its temp file.
//! - Opening rejects files whose metadata hash does not verify.

pub mod mph;
pub use mph::{Chd, ChdBuilder};

pub mod db;
pub use db::{DbReader, DbWriter};

pub mod digest;
pub use digest::{Xxh3BuildHasher, Xxh3Hasher};

mod error;
pub use error::{Error, Result};

pub(crate) mod utils;

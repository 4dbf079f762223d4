//! The constant database: a write-once record stream plus an index region
//! built around the embedded MPHF.
//!
//! [`DbWriter`] streams records into a temp file and freezes them into the
//! final, immutable database; [`DbReader`] memory-maps the index region
//! and serves concurrent constant-time lookups.

mod header;

mod writer;
pub use writer::DbWriter;

mod reader;
pub use reader::DbReader;

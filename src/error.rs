use thiserror::Error;

/// Errors surfaced at the public boundary of the crate.
///
/// Construction-time kinds (`DuplicateKey`, `InvalidLoad`,
/// `ConstructionFailed`, `ValueTooLarge`, `Frozen`) come out of
/// [`ChdBuilder`](crate::ChdBuilder) and [`DbWriter`](crate::DbWriter);
/// the remaining kinds come out of [`Chd`](crate::Chd) deserialization and
/// [`DbReader`](crate::DbReader).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The key is already present in the builder or writer.
    #[error("duplicate key {0:#x}")]
    DuplicateKey(u64),

    /// The load factor passed to `freeze` is not in `(0, 1)`.
    #[error("invalid load factor {0}; must be 0 < load < 1")]
    InvalidLoad(f64),

    /// CHD exhausted the seed budget for some bucket.
    #[error("failed to build MPH after {0} seed attempts")]
    ConstructionFailed(u32),

    /// Value length exceeds 2^32 - 1 bytes.
    #[error("value is larger than 2^32-1 bytes")]
    ValueTooLarge,

    /// Write operation on a writer that is already frozen or aborted.
    #[error("database already frozen")]
    Frozen,

    /// Serialized MPHF carries a format version this build cannot read.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// The file does not start with the `CHDB` magic.
    #[error("bad file magic")]
    BadMagic,

    /// Header fields out of range, a short table, or a seed body whose
    /// length is not a multiple of the seed width.
    #[error("corrupt index: {0}")]
    CorruptIndex(&'static str),

    /// The SHA-512/256 over the metadata region does not match the trailer.
    #[error("metadata checksum mismatch")]
    IntegrityError,

    /// The per-record keyed checksum does not match the stored record.
    #[error("corrupted record at offset {0}")]
    RecordCorrupt(u64),

    /// The slot selected by the MPHF holds a different key.
    #[error("no such key {0:#x}")]
    KeyNotFound(u64),

    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

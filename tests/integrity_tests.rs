#[cfg(test)]
mod tests {

    use std::fs::OpenOptions;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::path::{Path, PathBuf};

    use chdb::{DbReader, DbWriter, Error};
    use tempfile::tempdir;

    fn build_db(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("victim.db");
        let mut writer = DbWriter::create(&path).expect("create writer");
        writer.add(0xaa, b"first record value").expect("add");
        writer.add(0xbb, b"second record value").expect("add");
        writer.add(0xcc, b"third record value").expect("add");
        writer.freeze(0.9).expect("freeze");
        path
    }

    /// Flips one byte at `offset` (negative counts from the end).
    fn flip_byte(path: &Path, offset: i64) {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .expect("open for corruption");

        let pos = if offset < 0 {
            let size = file.metadata().expect("stat").len() as i64;
            (size + offset) as u64
        } else {
            offset as u64
        };

        let mut byte = [0u8];
        file.seek(SeekFrom::Start(pos)).expect("seek");
        file.read_exact(&mut byte).expect("read byte");
        byte[0] ^= 0xff;
        file.seek(SeekFrom::Start(pos)).expect("seek back");
        file.write_all(&byte).expect("write flipped byte");
        file.flush().expect("flush");
    }

    #[test]
    fn pristine_database_verifies() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);
        let reader = DbReader::open(&path, 0).expect("pristine file must open");
        assert_eq!(
            reader.lookup(0xaa).as_deref(),
            Some(&b"first record value"[..])
        );
    }

    #[test]
    fn metadata_flip_fails_open() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);

        // Last byte of the hashed index region, just before the trailer.
        flip_byte(&path, -33);
        match DbReader::open(&path, 0) {
            Err(Error::IntegrityError) => {}
            other => panic!("expected IntegrityError, got {other:?}"),
        }
    }

    #[test]
    fn trailer_flip_fails_open() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);

        flip_byte(&path, -1);
        match DbReader::open(&path, 0) {
            Err(Error::IntegrityError) => {}
            other => panic!("expected IntegrityError, got {other:?}"),
        }
    }

    #[test]
    fn header_salt_flip_fails_open() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);

        // Salt lives at bytes 8..24; the strong hash covers the header, so
        // a tampered salt cannot steer record checksums.
        flip_byte(&path, 10);
        match DbReader::open(&path, 0) {
            Err(Error::IntegrityError) => {}
            other => panic!("expected IntegrityError, got {other:?}"),
        }
    }

    #[test]
    fn bad_magic_is_detected_before_hashing() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);

        flip_byte(&path, 0);
        match DbReader::open(&path, 0) {
            Err(Error::BadMagic) => {}
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn nonzero_flags_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);

        flip_byte(&path, 5);
        match DbReader::open(&path, 0) {
            Err(Error::CorruptIndex(_)) => {}
            other => panic!("expected CorruptIndex, got {other:?}"),
        }
    }

    #[test]
    fn record_flip_is_caught_at_lookup_not_open() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("record.db");

        let mut writer = DbWriter::create(&path).expect("create writer");
        writer.add(0xaa, b"only record here").expect("add");
        writer.freeze(0.9).expect("freeze");

        // The one record starts right after the 64-byte header: 8 bytes of
        // checksum, then the value. Flip a value byte; records sit outside
        // the strong-hash region so open must still succeed.
        flip_byte(&path, 64 + 8 + 3);

        let reader = DbReader::open(&path, 0).expect("open succeeds");
        match reader.find(0xaa) {
            Err(Error::RecordCorrupt(off)) => assert_eq!(off, 64),
            other => panic!("expected RecordCorrupt, got {other:?}"),
        }
        assert_eq!(
            reader.lookup(0xaa),
            None,
            "lookup lowers corruption to absent"
        );
    }

    #[test]
    fn record_checksum_flip_is_caught_at_lookup() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("cksum.db");

        let mut writer = DbWriter::create(&path).expect("create writer");
        writer.add(0xaa, b"only record here").expect("add");
        writer.freeze(0.9).expect("freeze");

        flip_byte(&path, 64); // first checksum byte
        let reader = DbReader::open(&path, 0).expect("open succeeds");
        assert!(matches!(reader.find(0xaa), Err(Error::RecordCorrupt(_))));
    }

    #[test]
    fn truncated_files_fail_open() {
        let dir = tempdir().expect("temp dir");
        let path = build_db(&dir);
        let size = std::fs::metadata(&path).expect("stat").len();

        // Too small to even hold header and trailer.
        let tiny = dir.path().join("tiny.db");
        std::fs::copy(&path, &tiny).expect("copy");
        OpenOptions::new()
            .write(true)
            .open(&tiny)
            .expect("open")
            .set_len(50)
            .expect("truncate");
        assert!(matches!(
            DbReader::open(&tiny, 0),
            Err(Error::CorruptIndex(_))
        ));

        // Sheared trailer: the recomputed digest can no longer match.
        let sheared = dir.path().join("sheared.db");
        std::fs::copy(&path, &sheared).expect("copy");
        OpenOptions::new()
            .write(true)
            .open(&sheared)
            .expect("open")
            .set_len(size - 16)
            .expect("truncate");
        match DbReader::open(&sheared, 0) {
            Err(Error::IntegrityError) | Err(Error::CorruptIndex(_)) => {}
            other => panic!("truncated file opened: {other:?}"),
        }
    }
}

//! Content loader — reads the file to publish into memory, once.
//!
//! The buffer is immutable after [`Content::load`] returns. A single
//! trailing line feed is excluded from the published bytes so the
//! clipboard holds what the user typed, not what the editor appended.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Largest file size accepted, one below the signed 64-bit maximum.
pub const MAX_CONTENT_SIZE: u64 = i64::MAX as u64 - 1;

/// Content loader errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot determine size: {0}")]
    Seek(io::Error),
    #[error("file too large: {0} bytes (max {MAX_CONTENT_SIZE})")]
    TooLarge(u64),
    #[error("cannot allocate {0} bytes")]
    Alloc(usize),
    #[error("short read: expected {expected} bytes: {source}")]
    ShortRead { expected: usize, source: io::Error },
}

/// The bytes being published.
///
/// `bytes` holds the whole file; `len` is the logical length that is
/// handed to requestors.
#[derive(Debug)]
pub struct Content {
    bytes: Box<[u8]>,
    len: usize,
}

impl Content {
    /// Read `path` into memory.
    ///
    /// Any failure is fatal to the caller; partial reads are reported
    /// as [`LoadError::ShortRead`], never returned as content.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_bytes(read_sized(file)?))
    }

    /// Wrap an in-memory buffer, applying the trailing-newline rule.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = match bytes.last() {
            Some(b'\n') => bytes.len() - 1,
            _ => bytes.len(),
        };
        Self {
            bytes: bytes.into_boxed_slice(),
            len,
        }
    }

    /// The published bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Read exactly as many bytes as `reader` reports through its end
/// offset. Fewer bytes than that is an error, never a shorter buffer.
fn read_sized<R: Read + Seek>(mut reader: R) -> Result<Vec<u8>, LoadError> {
    let size = reader.seek(SeekFrom::End(0)).map_err(LoadError::Seek)?;
    if size > MAX_CONTENT_SIZE {
        return Err(LoadError::TooLarge(size));
    }
    let size = usize::try_from(size).map_err(|_| LoadError::TooLarge(size))?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| LoadError::Alloc(size))?;
    buf.resize(size, 0);

    reader.rewind().map_err(LoadError::Seek)?;
    reader.read_exact(&mut buf).map_err(|source| LoadError::ShortRead {
        expected: size,
        source,
    })?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    /// Reader whose end offset is `size`, regardless of how many bytes
    /// it actually holds. `size: None` makes the size query fail.
    struct FakeFile {
        data: Cursor<Vec<u8>>,
        size: Option<u64>,
    }

    impl FakeFile {
        fn new(data: &[u8], size: Option<u64>) -> Self {
            Self {
                data: Cursor::new(data.to_vec()),
                size,
            }
        }
    }

    impl Read for FakeFile {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for FakeFile {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::End(0) => self
                    .size
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "not seekable")),
                other => self.data.seek(other),
            }
        }
    }

    fn load_bytes(data: &[u8]) -> Content {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        Content::load(file.path()).unwrap()
    }

    #[test]
    fn content_without_newline_is_unchanged() {
        let c = load_bytes(b"hello");
        assert_eq!(c.as_bytes(), b"hello");
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn single_trailing_newline_is_stripped() {
        let c = load_bytes(b"hello\n");
        assert_eq!(c.as_bytes(), b"hello");
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn only_one_newline_is_stripped() {
        let c = load_bytes(b"two\n\n");
        assert_eq!(c.as_bytes(), b"two\n");
    }

    #[test]
    fn lone_newline_publishes_empty_content() {
        let c = load_bytes(b"\n");
        assert!(c.is_empty());
        assert_eq!(c.as_bytes(), b"");
    }

    #[test]
    fn empty_file_publishes_empty_content() {
        let c = load_bytes(b"");
        assert!(c.is_empty());
    }

    #[test]
    fn interior_newlines_and_binary_bytes_survive() {
        let data = b"a\nb\r\n\x00\xff end";
        let c = load_bytes(data);
        assert_eq!(c.as_bytes(), data);
    }

    #[test]
    fn crlf_keeps_carriage_return() {
        let c = load_bytes(b"line\r\n");
        assert_eq!(c.as_bytes(), b"line\r");
    }

    #[test]
    fn missing_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Content::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }

    #[test]
    fn newline_byte_stays_in_buffer() {
        let c = Content::from_bytes(b"x\n".to_vec());
        assert_eq!(c.bytes.len(), 2);
        assert_eq!(c.len(), 1);
    }

    // -- Failure paths --

    #[test]
    fn short_read_is_total_failure() {
        let err = read_sized(FakeFile::new(b"abc", Some(10))).unwrap_err();
        match err {
            LoadError::ShortRead { expected, source } => {
                assert_eq!(expected, 10);
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn size_just_over_limit_is_too_large() {
        let err = read_sized(FakeFile::new(b"", Some(MAX_CONTENT_SIZE + 1))).unwrap_err();
        assert!(matches!(err, LoadError::TooLarge(n) if n == MAX_CONTENT_SIZE + 1));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn size_at_limit_fails_allocation() {
        let err = read_sized(FakeFile::new(b"", Some(MAX_CONTENT_SIZE))).unwrap_err();
        assert!(matches!(err, LoadError::Alloc(_)));
    }

    #[test]
    fn unknown_size_is_seek_error() {
        let err = read_sized(FakeFile::new(b"abc", None)).unwrap_err();
        assert!(matches!(err, LoadError::Seek(_)));
    }

    #[test]
    fn reads_only_the_reported_size() {
        let buf = read_sized(FakeFile::new(b"abcdef", Some(3))).unwrap();
        assert_eq!(buf, b"abc");
    }
}

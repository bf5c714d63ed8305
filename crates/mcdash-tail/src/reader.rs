//! Stateless bounded reads of "everything new since offset"

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, TailError};

/// Result of a single bounded read
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Raw lines in file order; the last one may be a partial line
    pub lines: Vec<String>,
    /// Offset just past the last byte read
    pub new_offset: u64,
    pub bytes_read: u64,
}

impl Chunk {
    fn empty(offset: u64) -> Self {
        Self {
            lines: Vec::new(),
            new_offset: offset,
            bytes_read: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_read == 0
    }
}

/// Current size of the file at `path`, `None` if it does not exist
pub fn file_size(path: &Path) -> Result<Option<u64>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TailError::from_io(path.to_path_buf(), e)),
    }
}

/// Read every byte between `offset` and the current end of the file
///
/// The size is taken from the opened handle, so a file replaced between the
/// caller's size check and this read is still read consistently. A file that
/// shrinks during the read yields fewer bytes and a correspondingly smaller
/// `new_offset`. No state is kept between calls.
pub fn read_chunk(path: &Path, offset: u64) -> Result<Chunk> {
    let io_err = |e| TailError::from_io(path.to_path_buf(), e);

    let mut file = File::open(path).map_err(io_err)?;
    let size = file.metadata().map_err(io_err)?.len();
    if size <= offset {
        return Ok(Chunk::empty(offset));
    }

    let to_read = size - offset;
    file.seek(SeekFrom::Start(offset)).map_err(io_err)?;

    let mut buf = Vec::with_capacity(usize::try_from(to_read).unwrap_or(0));
    let bytes_read = file.take(to_read).read_to_end(&mut buf).map_err(io_err)? as u64;

    let content = String::from_utf8_lossy(&buf);
    Ok(Chunk {
        lines: split_lines(&content),
        new_offset: offset + bytes_read,
        bytes_read,
    })
}

/// Normalize `\r\n` and `\r` to `\n` and split into lines
///
/// A trailing line without a terminator is kept; the empty segment after a
/// final `\n` is not a line.
fn split_lines(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if normalized.is_empty() {
        return Vec::new();
    }
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
    body.split('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("latest.log");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.log");
        assert!(matches!(
            read_chunk(&path, 0),
            Err(TailError::SourceUnavailable(_))
        ));
        assert_eq!(file_size(&path).unwrap(), None);
    }

    #[test]
    fn test_nothing_new_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, b"abc\n");
        let chunk = read_chunk(&path, 4).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(chunk.new_offset, 4);

        // An offset past the end is not an error either
        let chunk = read_chunk(&path, 100).unwrap();
        assert!(chunk.lines.is_empty());
        assert_eq!(chunk.new_offset, 100);
    }

    #[test]
    fn test_reads_from_offset_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, b"first\nsecond\nthird\n");
        let chunk = read_chunk(&path, 6).unwrap();
        assert_eq!(chunk.lines, vec!["second", "third"]);
        assert_eq!(chunk.bytes_read, 13);
        assert_eq!(chunk.new_offset, 19);
        assert_eq!(file_size(&path).unwrap(), Some(19));
    }

    #[test]
    fn test_normalizes_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, b"a\r\nb\rc\nd");
        let chunk = read_chunk(&path, 0).unwrap();
        assert_eq!(chunk.lines, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_partial_line_is_completed_on_next_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, b"[Server thread/INFO]: Hel");
        let first = read_chunk(&path, 0).unwrap();
        assert_eq!(first.lines, vec!["[Server thread/INFO]: Hel"]);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"lo\nnext\n").unwrap();

        let second = read_chunk(&path, first.new_offset).unwrap();
        assert_eq!(second.lines, vec!["lo", "next"]);
        assert_eq!(second.new_offset, 33);
    }

    #[test]
    fn test_blank_lines_are_preserved() {
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert_eq!(split_lines("\n"), vec![""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, b"ok \xff\xfe done\n");
        let chunk = read_chunk(&path, 0).unwrap();
        assert_eq!(chunk.lines.len(), 1);
        assert!(chunk.lines[0].starts_with("ok "));
        assert!(chunk.lines[0].ends_with(" done"));
    }
}

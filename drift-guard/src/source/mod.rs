//! Incremental reading of a growing log file.
//!
//! [`LineSource`] owns the read cursor and turns "there may be new bytes"
//! into complete lines. It does not decide *when* to read: the engine calls
//! [`LineSource::read_available`] whenever either wake-up producer fires,
//! the [`WakeSource`] notification queue or the fixed poll interval.

mod wake;

pub use wake::WakeSource;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, MonitorResult};

/// Most bytes taken from the file by one read.
pub const MAX_READ_BYTES: u64 = 1024 * 1024;

/// Longest unterminated line buffered before it is dropped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Byte position of the next unread byte in the monitored file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionCursor {
    pub byte_offset: u64,
}

/// Whether the source currently has a file to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The target file does not exist (yet, or any more).
    Waiting,
    /// The target file is open for incremental reads.
    Tailing,
}

/// Result of one read attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The file is absent. Not an error.
    Waiting,
    /// Complete lines appended since the previous read, possibly none.
    Lines(Vec<String>),
}

/// Identity of the file behind a path, used to notice rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_metadata: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Delivers every newline-terminated line appended to a file, exactly once
/// and in order.
///
/// A trailing line without its terminator is held back and completed by a
/// later read. If the file shrinks below the cursor or is replaced by a
/// different file, reading restarts at byte 0.
///
/// Each read takes at most [`MAX_READ_BYTES`]; [`LineSource::has_unread`]
/// tells the caller to come back for the rest. A partial line growing past
/// [`MAX_LINE_BYTES`] is dropped up to its terminator and counted in
/// [`LineSource::take_oversized_lines`].
#[derive(Debug)]
pub struct LineSource {
    path: PathBuf,
    state: SourceState,
    cursor: IngestionCursor,
    pending: Vec<u8>,
    /// Dropping bytes until the next newline.
    discarding: bool,
    oversized_lines: u64,
    /// File length seen by the last read.
    known_len: u64,
    max_read_bytes: u64,
    max_line_bytes: usize,
    identity: Option<FileIdentity>,
    /// Seek to end-of-file on first open. Only applies to a file that
    /// already exists when monitoring starts.
    tail_on_open: bool,
}

impl LineSource {
    /// Creates a source for `path`.
    ///
    /// Unless `from_beginning` is set, content already present when the file
    /// is first seen is skipped. A file that only appears later is read in
    /// full.
    pub fn new(path: impl AsRef<Path>, from_beginning: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: SourceState::Waiting,
            cursor: IngestionCursor::default(),
            pending: Vec::new(),
            discarding: false,
            oversized_lines: 0,
            known_len: 0,
            max_read_bytes: MAX_READ_BYTES,
            max_line_bytes: MAX_LINE_BYTES,
            identity: None,
            tail_on_open: !from_beginning,
        }
    }

    /// Overrides the read chunk and line length limits.
    pub fn with_limits(mut self, max_read_bytes: u64, max_line_bytes: usize) -> Self {
        self.max_read_bytes = max_read_bytes.max(1);
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Monitored path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state.
    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Current cursor.
    pub fn cursor(&self) -> IngestionCursor {
        self.cursor
    }

    /// Number of buffered bytes belonging to an unterminated line.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Whether the last read stopped before the end of the file.
    pub fn has_unread(&self) -> bool {
        self.state == SourceState::Tailing && self.cursor.byte_offset < self.known_len
    }

    /// Returns and resets the number of lines dropped for exceeding the
    /// line length limit.
    pub fn take_oversized_lines(&mut self) -> u64 {
        std::mem::take(&mut self.oversized_lines)
    }

    /// Reads the next chunk between the cursor and end-of-file.
    ///
    /// # Errors
    ///
    /// I/O failures other than the file being absent, including a directory
    /// sitting at the path, are returned as [`MonitorError::Io`]. The cursor
    /// is left untouched, so the next call retries the same range.
    pub async fn read_available(&mut self) -> MonitorResult<ReadOutcome> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.on_missing();
                return Ok(ReadOutcome::Waiting);
            }
            Err(e) => return Err(MonitorError::io(&self.path, e)),
        };
        if metadata.is_dir() {
            return Err(MonitorError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path is a directory"),
            ));
        }

        let len = metadata.len();
        let identity = FileIdentity::of(&metadata);

        match self.state {
            SourceState::Waiting => {
                self.state = SourceState::Tailing;
                self.identity = identity;
                self.cursor.byte_offset = if self.tail_on_open { len } else { 0 };
                info!(
                    path = %self.path.display(),
                    byte_offset = self.cursor.byte_offset,
                    "Opened log file"
                );
            }
            SourceState::Tailing if identity != self.identity => {
                warn!(path = %self.path.display(), "Log file replaced, reading from start");
                self.identity = identity;
                self.restart();
            }
            SourceState::Tailing if len < self.cursor.byte_offset => {
                warn!(
                    path = %self.path.display(),
                    byte_offset = self.cursor.byte_offset,
                    len,
                    "Log file truncated, reading from start"
                );
                self.restart();
            }
            SourceState::Tailing => {}
        }
        self.tail_on_open = false;
        self.known_len = len;

        if len <= self.cursor.byte_offset {
            return Ok(ReadOutcome::Lines(Vec::new()));
        }

        let bytes = self.read_chunk().await?;
        self.cursor.byte_offset += bytes.len() as u64;
        debug!(
            read = bytes.len(),
            byte_offset = self.cursor.byte_offset,
            remaining = self.known_len.saturating_sub(self.cursor.byte_offset),
            "Read appended bytes"
        );

        Ok(ReadOutcome::Lines(self.split_lines(&bytes)))
    }

    async fn read_chunk(&self) -> MonitorResult<Vec<u8>> {
        let io_err = |e| MonitorError::io(&self.path, e);

        let mut file = tokio::fs::File::open(&self.path).await.map_err(io_err)?;
        file.seek(SeekFrom::Start(self.cursor.byte_offset))
            .await
            .map_err(io_err)?;

        let mut bytes = Vec::new();
        file.take(self.max_read_bytes)
            .read_to_end(&mut bytes)
            .await
            .map_err(io_err)?;
        Ok(bytes)
    }

    /// Splits newly read bytes into complete lines, carrying any unterminated
    /// tail over to the next read.
    fn split_lines(&mut self, bytes: &[u8]) -> Vec<String> {
        let bytes = if self.discarding {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    &bytes[end + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            bytes
        };
        self.pending.extend_from_slice(bytes);

        let lines = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let rest = self.pending.split_off(last_newline + 1);
                let mut complete = std::mem::replace(&mut self.pending, rest);
                complete.pop();

                complete
                    .split(|&b| b == b'\n')
                    .map(|line| {
                        let line = line.strip_suffix(b"\r").unwrap_or(line);
                        String::from_utf8_lossy(line).into_owned()
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        if self.pending.len() > self.max_line_bytes {
            warn!(
                path = %self.path.display(),
                buffered = self.pending.len(),
                limit = self.max_line_bytes,
                "Dropping oversized line"
            );
            self.pending.clear();
            self.discarding = true;
            self.oversized_lines += 1;
        }

        lines
    }

    fn restart(&mut self) {
        self.cursor = IngestionCursor::default();
        self.pending.clear();
        self.discarding = false;
    }

    fn on_missing(&mut self) {
        if self.state == SourceState::Tailing {
            warn!(path = %self.path.display(), "Log file disappeared");
            self.state = SourceState::Waiting;
            self.identity = None;
            self.restart();
        }
        // Whatever shows up at this path from now on is new content.
        self.tail_on_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    async fn lines(source: &mut LineSource) -> Vec<String> {
        match source.read_available().await.unwrap() {
            ReadOutcome::Lines(lines) => lines,
            ReadOutcome::Waiting => panic!("unexpected waiting state"),
        }
    }

    #[test]
    fn test_split_lines_holds_partial_tail() {
        let mut source = LineSource::new("unused", true);
        assert_eq!(source.split_lines(b"a\nb\r\nc"), vec!["a", "b"]);
        assert_eq!(source.pending_bytes(), 1);
        assert_eq!(source.split_lines(b"d\n"), vec!["cd"]);
        assert_eq!(source.pending_bytes(), 0);
        assert!(source.split_lines(b"no newline").is_empty());
    }

    #[test]
    fn test_split_lines_keeps_empty_lines() {
        let mut source = LineSource::new("unused", true);
        assert_eq!(source.split_lines(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_oversized_partial_line_is_dropped() {
        let mut source = LineSource::new("unused", true).with_limits(64, 8);

        assert_eq!(source.split_lines(b"ok\n0123456789"), vec!["ok"]);
        assert_eq!(source.pending_bytes(), 0);
        assert_eq!(source.take_oversized_lines(), 1);

        // The rest of the long line is skipped up to its terminator.
        assert!(source.split_lines(b"abcdef").is_empty());
        assert_eq!(source.pending_bytes(), 0);
        assert_eq!(source.split_lines(b"ghi\nnext\n"), vec!["next"]);
        assert_eq!(source.take_oversized_lines(), 0);
    }

    #[tokio::test]
    async fn test_reads_in_bounded_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append(&path, "aaaa\nbbbb\ncccc\n");

        let mut source = LineSource::new(&path, true).with_limits(6, 64);
        assert_eq!(lines(&mut source).await, vec!["aaaa"]);
        assert_eq!(source.cursor().byte_offset, 6);
        assert!(source.has_unread());

        let mut rest = Vec::new();
        while source.has_unread() {
            rest.extend(lines(&mut source).await);
        }
        assert_eq!(rest, vec!["bbbb", "cccc"]);
        assert_eq!(source.cursor().byte_offset, 15);
    }

    #[tokio::test]
    async fn test_read_error_keeps_cursor_and_recovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::create_dir(&path).unwrap();

        let mut source = LineSource::new(&path, true);
        let result = source.read_available().await;
        assert!(matches!(result, Err(MonitorError::Io { .. })));
        assert_eq!(source.cursor().byte_offset, 0);
        assert!(!source.has_unread());

        std::fs::remove_dir(&path).unwrap();
        append(&path, "first\nsecond\n");
        assert_eq!(lines(&mut source).await, vec!["first", "second"]);
        assert_eq!(source.cursor().byte_offset, 13);
    }

    #[tokio::test]
    async fn test_missing_file_is_waiting() {
        let dir = TempDir::new().unwrap();
        let mut source = LineSource::new(dir.path().join("absent.jsonl"), false);

        assert_eq!(source.read_available().await.unwrap(), ReadOutcome::Waiting);
        assert_eq!(source.state(), SourceState::Waiting);
    }

    #[tokio::test]
    async fn test_existing_file_tails_from_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append(&path, "old 1\nold 2\n");

        let mut source = LineSource::new(&path, false);
        assert!(lines(&mut source).await.is_empty());
        assert_eq!(source.cursor().byte_offset, 12);

        append(&path, "new\n");
        assert_eq!(lines(&mut source).await, vec!["new"]);
    }

    #[tokio::test]
    async fn test_from_beginning_reads_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append(&path, "old 1\nold 2\n");

        let mut source = LineSource::new(&path, true);
        assert_eq!(lines(&mut source).await, vec!["old 1", "old 2"]);
    }

    #[tokio::test]
    async fn test_late_file_is_read_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut source = LineSource::new(&path, false);
        assert_eq!(source.read_available().await.unwrap(), ReadOutcome::Waiting);

        append(&path, "first\nsecond\n");
        assert_eq!(lines(&mut source).await, vec!["first", "second"]);
        assert_eq!(source.state(), SourceState::Tailing);
    }

    #[tokio::test]
    async fn test_truncation_resets_cursor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append(&path, "line one\nline two\n");

        let mut source = LineSource::new(&path, true);
        assert_eq!(lines(&mut source).await.len(), 2);

        std::fs::write(&path, "x\n").unwrap();
        assert_eq!(lines(&mut source).await, vec!["x"]);
        assert_eq!(source.cursor().byte_offset, 2);
    }

    #[tokio::test]
    async fn test_vanished_file_returns_to_waiting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append(&path, "a\n");

        let mut source = LineSource::new(&path, true);
        assert_eq!(lines(&mut source).await, vec!["a"]);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(source.read_available().await.unwrap(), ReadOutcome::Waiting);
        assert_eq!(source.cursor().byte_offset, 0);

        append(&path, "b\nc\n");
        assert_eq!(lines(&mut source).await, vec!["b", "c"]);
    }
}

//! Log output targets
//!
//! Records always reach stderr. When a log file is configured they are also
//! appended to it, and the file is rotated once it reaches its size limit.

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Writes every buffer to two writers
pub struct Tee<A: Write, B: Write> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Open `path` for appending, rotating it to `<path>.1`, `<path>.2`, ...
/// whenever it would grow past `max_bytes`
///
/// At most `backups` rotated files are kept.
pub fn rotating_file(
    path: &Path,
    max_bytes: usize,
    backups: usize,
) -> io::Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    Ok(FileRotate::new(
        path,
        AppendCount::new(backups),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Console plus rotating file writer for the logger
pub fn console_and_file(
    path: &Path,
    max_bytes: usize,
    backups: usize,
) -> io::Result<Tee<io::Stderr, FileRotate<AppendCount>>> {
    Ok(Tee::new(io::stderr(), rotating_file(path, max_bytes, backups)?))
}

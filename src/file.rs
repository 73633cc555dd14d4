use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "class",
    ]
    .into_iter()
    .collect()
});

/// Metadata about one file discovered by the scanner.
///
/// Created once during scanning and immutable afterwards; the file's content
/// is never held here — the allocator reads it lazily at admission time via
/// [`FileRecord::read_content`].
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path relative to the scanned root, POSIX-normalized (`/` separators)
    pub relative_path: String,

    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// File size in bytes
    pub size_bytes: u64,

    /// Number of lines (0 for binary files)
    pub line_count: usize,

    /// Lowercased extension without the dot, empty when none
    pub extension: String,

    /// Whether the file looks binary (null byte, low ASCII ratio)
    pub is_binary: bool,

    /// Last modification time, when the filesystem reports one
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Builds a record for `path` relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be read or the binary sniff fails.
    pub fn from_path(path: &Path, root: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;

        let relative_path = normalize_separators(
            &pathdiff::diff_paths(path, root)
                .unwrap_or_else(|| path.to_path_buf())
                .to_string_lossy(),
        );

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let is_binary = has_binary_extension(path) || is_likely_binary(path)?;
        let line_count = if is_binary { 0 } else { count_lines(path)? };

        Ok(Self {
            relative_path,
            absolute_path: path.to_path_buf(),
            size_bytes: metadata.len(),
            line_count,
            extension,
            is_binary,
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Reads the file's content as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid UTF-8.
    /// Callers treat this as a recoverable skip, never as a fatal condition.
    pub fn read_content(&self) -> Result<String> {
        fs::read_to_string(&self.absolute_path).map_err(|e| Error::io(&self.absolute_path, e))
    }

    /// Directory depth of the record below the root (files at the root have
    /// depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.relative_path.matches('/').count()
    }

    /// The final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Rewrites platform path separators to `/`.
pub(crate) fn normalize_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Counts lines by scanning for newline bytes.
///
/// A trailing chunk without a final newline still counts as one line, which
/// matches `str::lines` on the file's content.
pub(crate) fn count_lines(path: &Path) -> Result<usize> {
    const BUFFER_SIZE: usize = 64 * 1024;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let mut lines = 0usize;
    let mut last_byte = None;

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        lines += memchr::memchr_iter(b'\n', &buffer[..bytes_read]).count();
        last_byte = Some(buffer[bytes_read - 1]);
    }

    if last_byte.is_some_and(|b| b != b'\n') {
        lines += 1;
    }

    Ok(lines)
}

/// Determines if a file is likely binary by analyzing its content.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. Checks for null bytes (binary indicator)
/// 3. Calculates the ratio of ASCII characters
/// 4. Files with null bytes or low ASCII ratio are considered binary
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    #[test]
    fn test_record_from_path() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("src/main.rs");
        file.write_str("fn main() {}\nfn helper() {}\n").unwrap();

        let record = FileRecord::from_path(file.path(), temp.path()).unwrap();

        assert_eq!(record.relative_path, "src/main.rs");
        assert_eq!(record.extension, "rs");
        assert_eq!(record.line_count, 2);
        assert!(!record.is_binary);
        assert_eq!(record.depth(), 1);
        assert_eq!(record.file_name(), "main.rs");
        assert!(record.last_modified.is_some());
    }

    #[test]
    fn test_record_binary_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("blob.bin");
        file.write_binary(&[0u8, 1, 2, 3]).unwrap();

        let record = FileRecord::from_path(file.path(), temp.path()).unwrap();

        assert!(record.is_binary);
        assert_eq!(record.line_count, 0);
        assert_eq!(record.size_bytes, 4);
    }

    #[test]
    fn test_read_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.txt");
        file.write_str("hello").unwrap();

        let record = FileRecord::from_path(file.path(), temp.path()).unwrap();
        assert_eq!(record.read_content().unwrap(), "hello");
    }

    #[test]
    fn test_count_lines_trailing_newline() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("a.txt");
        file.write_str("one\ntwo\n").unwrap();

        assert_eq!(count_lines(file.path()).unwrap(), 2);
    }

    #[test]
    fn test_count_lines_no_trailing_newline() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("a.txt");
        file.write_str("one\ntwo\nthree").unwrap();

        assert_eq!(count_lines(file.path()).unwrap(), 3);
    }

    #[test]
    fn test_count_lines_empty() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("empty.txt");
        file.touch().unwrap();

        assert_eq!(count_lines(file.path()).unwrap(), 0);
    }

    #[test]
    fn test_is_likely_binary_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.txt");
        file.write_str("Hello, world!").unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_binary_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.bin");

        let mut f = File::create(file.path()).unwrap();
        f.write_all(&[0u8; 100]).unwrap(); // Null bytes

        assert!(is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_empty_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("empty.txt");
        file.touch().unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_has_binary_extension() {
        assert!(has_binary_extension(Path::new("app.exe")));
        assert!(has_binary_extension(Path::new("image.PNG")));
        assert!(has_binary_extension(Path::new("archive.zip")));
        assert!(!has_binary_extension(Path::new("code.rs")));
        assert!(!has_binary_extension(Path::new("no_extension")));
    }

    #[test]
    fn test_normalize_separators_is_identity_on_posix() {
        assert_eq!(normalize_separators("a/b/c.rs"), "a/b/c.rs");
    }
}

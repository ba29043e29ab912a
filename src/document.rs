use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A UTF-8 text document with line-boundary semantics.
///
/// Documents are read from disk once, transformed in memory, and written back
/// once. All transformations produce a new `Document`; the original is never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path} is not valid UTF-8: {source}")]
    Utf8 {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a document from disk, validating UTF-8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = std::str::from_utf8(&bytes).map_err(|source| DocumentError::Utf8 {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            text: text.to_string(),
        })
    }

    /// Write the document to disk atomically, newline-terminated.
    ///
    /// Uses tempfile + fsync + rename for crash safety, then bumps the mtime
    /// so dev-server file watchers notice the change.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let mut out = self.text.clone();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        atomic_write(path, out.as_bytes())?;

        let now = filetime::FileTime::now();
        filetime::set_file_mtime(path, now)?;

        Ok(())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// The content of line `index` (newline excluded), if it exists.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.text.lines().nth(index)
    }

    /// Byte offset where line `index` starts.
    ///
    /// `index == line_count()` is accepted and resolves to the end of the
    /// text, so it can serve as an insertion point after the last line.
    pub fn line_start(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return Some(0);
        }
        let mut seen = 0;
        for (pos, byte) in self.text.bytes().enumerate() {
            if byte == b'\n' {
                seen += 1;
                if seen == index {
                    return Some(pos + 1);
                }
            }
        }
        if index == self.line_count() {
            Some(self.text.len())
        } else {
            None
        }
    }

    /// Byte span of line `index`, excluding its terminator.
    pub fn line_span(&self, index: usize) -> Option<(usize, usize)> {
        let start = self.line_start(index)?;
        if start >= self.text.len() {
            return None;
        }
        let end = self.text[start..]
            .find('\n')
            .map(|rel| start + rel)
            .unwrap_or(self.text.len());
        Some((start, end))
    }

    /// Index of the line containing byte offset `offset`.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.text[..offset.min(self.text.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
    }

    /// Produce a new document with `[start, end)` replaced by `replacement`.
    ///
    /// Offsets must lie on character boundaries; locators only ever produce
    /// boundaries of matched substrings or line starts, which satisfy this.
    pub fn splice(&self, start: usize, end: usize, replacement: &str) -> Document {
        let mut text =
            String::with_capacity(self.text.len() + replacement.len() - (end - start));
        text.push_str(&self.text[..start]);
        text.push_str(replacement);
        text.push_str(&self.text[end..]);
        Document { text }
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the target file is untouched.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), DocumentError> {
    // Tempfile in the same directory so the rename stays on one filesystem
    let parent = path.parent().ok_or_else(|| {
        DocumentError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

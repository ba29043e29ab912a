use crate::document::Document;
use crate::locator::Anchor;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The bounded transformation applied at a resolved anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Replace the resolved span (or, for a line anchor, the full matched
    /// line excluding its terminator) with new text.
    Replace { text: String },
    /// Insert an ordered block of lines immediately before or after the
    /// resolved position.
    InsertLines {
        lines: Vec<String>,
        placement: Placement,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Get hash value regardless of variant.
    pub fn hash(&self) -> u64 {
        match self {
            EditVerification::Hash(h) => *h,
            EditVerification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in document of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Line index {index} is out of range for a document of {line_count} lines")]
    LineOutOfRange { index: usize, line_count: usize },
}

/// The fundamental edit primitive: a verified byte-span replacement.
///
/// Both edit actions compile down to this one shape; an insertion is a
/// zero-width span. Intelligence lives in anchor resolution, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpanEdit does nothing until apply() is called"]
pub struct SpanEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text for [byte_start, byte_end)
    pub new_text: String,
    /// What we expect to find at the span before applying
    pub expected_before: EditVerification,
}

/// A compiled edit, or the discovery that there is nothing left to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledEdit {
    Pending(SpanEdit),
    /// The document already carries the edit's result at the anchor.
    AlreadyApplied,
}

/// Result of applying a span edit to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditOutcome should be checked for applied/already-applied"]
pub enum EditOutcome {
    Applied(Document),
    AlreadyApplied,
}

impl EditAction {
    pub fn replace(text: impl Into<String>) -> Self {
        EditAction::Replace { text: text.into() }
    }

    pub fn insert_lines<I, S>(lines: I, placement: Placement) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EditAction::InsertLines {
            lines: lines.into_iter().map(Into::into).collect(),
            placement,
        }
    }

    /// Compile this action against a resolved anchor into a span edit.
    pub fn compile(&self, document: &Document, anchor: &Anchor) -> Result<CompiledEdit, EditError> {
        match self {
            EditAction::Replace { text } => compile_replace(document, anchor, text),
            EditAction::InsertLines { lines, placement } => {
                compile_insert(document, anchor, lines, *placement)
            }
        }
    }
}

fn compile_replace(
    document: &Document,
    anchor: &Anchor,
    text: &str,
) -> Result<CompiledEdit, EditError> {
    let (byte_start, byte_end) = match anchor {
        Anchor::Span {
            byte_start,
            byte_end,
        } => (*byte_start, *byte_end),
        Anchor::Line { index } => {
            document
                .line_span(*index)
                .ok_or_else(|| EditError::LineOutOfRange {
                    index: *index,
                    line_count: document.line_count(),
                })?
        }
    };

    let current = &document.text()[byte_start..byte_end];
    if current == text {
        return Ok(CompiledEdit::AlreadyApplied);
    }

    Ok(CompiledEdit::Pending(SpanEdit {
        byte_start,
        byte_end,
        new_text: text.to_string(),
        expected_before: EditVerification::from_text(current),
    }))
}

fn compile_insert(
    document: &Document,
    anchor: &Anchor,
    lines: &[String],
    placement: Placement,
) -> Result<CompiledEdit, EditError> {
    // Insertion is line-based; a span anchor contributes the line holding
    // its start (or end, for `After`).
    let insert_at = match (anchor, placement) {
        (Anchor::Line { index }, Placement::Before) => *index,
        (Anchor::Line { index }, Placement::After) => *index + 1,
        (Anchor::Span { byte_start, .. }, Placement::Before) => {
            document.line_of_offset(*byte_start)
        }
        (Anchor::Span { byte_end, .. }, Placement::After) => document.line_of_offset(*byte_end) + 1,
    };

    if insert_already_applied(document, insert_at, lines, placement) {
        return Ok(CompiledEdit::AlreadyApplied);
    }

    let offset = document
        .line_start(insert_at)
        .ok_or_else(|| EditError::LineOutOfRange {
            index: insert_at,
            line_count: document.line_count(),
        })?;

    let block = lines.join("\n");
    let text = document.text();
    // Inserting past a final line that lacks a terminator needs the newline
    // in front of the block instead of behind it.
    let new_text = if offset == text.len() && !text.is_empty() && !text.ends_with('\n') {
        format!("\n{block}")
    } else {
        format!("{block}\n")
    };

    Ok(CompiledEdit::Pending(SpanEdit {
        byte_start: offset,
        byte_end: offset,
        new_text,
        expected_before: EditVerification::ExactMatch(String::new()),
    }))
}

/// Detect a block that a previous run already inserted.
///
/// The anchor line survives an insertion, so a re-run resolves it again; the
/// block then sits immediately before the insertion point (`Before`) or
/// immediately at it (`After`).
fn insert_already_applied(
    document: &Document,
    insert_at: usize,
    lines: &[String],
    placement: Placement,
) -> bool {
    if lines.is_empty() {
        return true;
    }
    let existing: Vec<&str> = match placement {
        Placement::Before => {
            let Some(start) = insert_at.checked_sub(lines.len()) else {
                return false;
            };
            document.lines().skip(start).take(lines.len()).collect()
        }
        Placement::After => document.lines().skip(insert_at).take(lines.len()).collect(),
    };
    existing.len() == lines.len() && existing.iter().zip(lines).all(|(have, want)| have == want)
}

impl SpanEdit {
    /// Apply this edit to a document, producing a new document.
    pub fn apply(&self, document: &Document) -> Result<EditOutcome, EditError> {
        let text = document.text();

        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: text.len(),
            });
        }

        let current = &text[self.byte_start..self.byte_end];

        // Idempotency: the span already holds the new text
        if current == self.new_text {
            return Ok(EditOutcome::AlreadyApplied);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }

        Ok(EditOutcome::Applied(document.splice(
            self.byte_start,
            self.byte_end,
            &self.new_text,
        )))
    }
}

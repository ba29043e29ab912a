use crate::document::Document;
use std::fmt;
use thiserror::Error;

/// A resolved anchor position within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Byte span of an exact-substring match.
    Span { byte_start: usize, byte_end: usize },
    /// Index of the first line satisfying a predicate.
    Line { index: usize },
}

/// A strategy for resolving an anchor's position.
///
/// Resolution is strict: zero matches fail with [`LocatorError::AnchorNotFound`],
/// and an exact-substring locator with more than one occurrence fails with
/// [`LocatorError::AmbiguousAnchor`]. Predicate locators take the first
/// satisfying line in forward scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Exact(ExactAnchor),
    Predicate(LinePredicate),
}

/// A literal block of text that must appear verbatim, exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactAnchor {
    pub anchor: String,
}

impl ExactAnchor {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
        }
    }
}

/// A boolean condition over a line and a window of preceding lines.
///
/// All supplied conditions must hold at the same index. The window covers the
/// `window` lines strictly before the candidate line (`lines[i-window..i]`),
/// saturating at the start of the document, so `window = 1` inspects exactly
/// the previous line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePredicate {
    /// Line content, trimmed of surrounding whitespace, equals this string.
    pub equals_trimmed: Option<String>,
    /// Line contains this substring.
    pub contains: Option<String>,
    /// Some line in the preceding window contains this substring.
    pub window_contains: Option<String>,
    /// Number of preceding lines the window spans.
    pub window: usize,
}

impl Default for LinePredicate {
    fn default() -> Self {
        Self {
            equals_trimmed: None,
            contains: None,
            window_contains: None,
            window: 1,
        }
    }
}

impl LinePredicate {
    /// Whether any condition is present. A conditionless predicate matches
    /// nothing; config validation rejects it before it gets here.
    pub fn has_conditions(&self) -> bool {
        self.equals_trimmed.is_some() || self.contains.is_some() || self.window_contains.is_some()
    }

    fn matches(&self, index: usize, line: &str, lines: &[&str]) -> bool {
        if !self.has_conditions() {
            return false;
        }
        if let Some(expected) = &self.equals_trimmed {
            if line.trim() != expected {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            if !line.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.window_contains {
            let start = index.saturating_sub(self.window);
            if !lines[start..index]
                .iter()
                .any(|l| l.contains(needle.as_str()))
            {
                return false;
            }
        }
        true
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("anchor not found: {locator}")]
    AnchorNotFound { locator: String },

    #[error("ambiguous anchor ({count} matches, expected 1): {locator}")]
    AmbiguousAnchor { locator: String, count: usize },
}

impl Locator {
    pub fn exact(anchor: impl Into<String>) -> Self {
        Locator::Exact(ExactAnchor::new(anchor))
    }

    /// Resolve this locator against a document.
    pub fn resolve(&self, document: &Document) -> Result<Anchor, LocatorError> {
        match self {
            Locator::Exact(exact) => self.resolve_exact(document, &exact.anchor),
            Locator::Predicate(predicate) => self.resolve_predicate(document, predicate),
        }
    }

    fn resolve_exact(&self, document: &Document, anchor: &str) -> Result<Anchor, LocatorError> {
        let text = document.text();

        // O(1) ambiguity check: bail as soon as a second match exists
        let mut occurrences = text.match_indices(anchor);
        let first = occurrences.next();
        match first {
            None => Err(LocatorError::AnchorNotFound {
                locator: self.describe(),
            }),
            Some((byte_start, _)) => {
                if occurrences.next().is_some() {
                    return Err(LocatorError::AmbiguousAnchor {
                        locator: self.describe(),
                        count: text.matches(anchor).count(), // full count only for the message
                    });
                }
                Ok(Anchor::Span {
                    byte_start,
                    byte_end: byte_start + anchor.len(),
                })
            }
        }
    }

    fn resolve_predicate(
        &self,
        document: &Document,
        predicate: &LinePredicate,
    ) -> Result<Anchor, LocatorError> {
        let lines: Vec<&str> = document.lines().collect();
        for (index, line) in lines.iter().enumerate() {
            if predicate.matches(index, line, &lines) {
                return Ok(Anchor::Line { index });
            }
        }
        Err(LocatorError::AnchorNotFound {
            locator: self.describe(),
        })
    }

    /// Short human-readable description, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Locator::Exact(exact) => format!("exact text {:?}", preview(&exact.anchor)),
            Locator::Predicate(predicate) => {
                let mut parts = Vec::new();
                if let Some(s) = &predicate.equals_trimmed {
                    parts.push(format!("line equals {:?}", preview(s)));
                }
                if let Some(s) = &predicate.contains {
                    parts.push(format!("line contains {:?}", preview(s)));
                }
                if let Some(s) = &predicate.window_contains {
                    parts.push(format!(
                        "previous {} line(s) contain {:?}",
                        predicate.window,
                        preview(s)
                    ));
                }
                format!("line predicate ({})", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Truncate anchor text for error messages.
fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 48;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}

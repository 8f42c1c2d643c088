//! Span - Source location tracking for AST nodes and diagnostics
//!
//! A `Span` records where a construct came from: the owning source file, the
//! byte range, and the line/column of its start. Spans are small and cheap to
//! copy; synthetic nodes use `Span::synthetic()`.

use serde::{Deserialize, Serialize};

/// Identifies one source file within a compilation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl SourceId {
    pub const NONE: SourceId = SourceId(u32::MAX);
}

/// A location in a source file: byte offset + length plus line/column of the
/// start position (1-based; 0 means "unknown").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub source: SourceId,
    /// Start byte offset (inclusive).
    pub start: u32,
    /// Length in bytes.
    pub len: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    #[inline]
    pub const fn new(source: SourceId, start: u32, len: u32, line: u32, column: u32) -> Self {
        Span {
            source,
            start,
            len,
            line,
            column,
        }
    }

    /// A span for synthesized constructs with no source location.
    #[inline]
    pub const fn synthetic() -> Self {
        Span {
            source: SourceId::NONE,
            start: 0,
            len: 0,
            line: 0,
            column: 0,
        }
    }

    #[inline]
    pub const fn is_synthetic(&self) -> bool {
        self.source.0 == u32::MAX
    }

    #[inline]
    pub const fn end(&self) -> u32 {
        self.start + self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end()
    }

    /// Merge two spans of the same file into one covering both.
    pub fn merge(&self, other: Span) -> Span {
        if self.is_synthetic() {
            return other;
        }
        if other.is_synthetic() || self.source != other.source {
            return *self;
        }
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        let (line, column) = if self.start <= other.start {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            source: self.source,
            start,
            len: end - start,
            line,
            column,
        }
    }

    /// Extract the covered slice from the file's text.
    #[inline]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        let start = (self.start as usize).min(text.len());
        let end = (self.end() as usize).min(text.len());
        text.get(start..end).unwrap_or("")
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A trait for things that carry a source span.
pub trait Spanned {
    fn span(&self) -> Span;
}

impl Spanned for Span {
    fn span(&self) -> Span {
        *self
    }
}

//! Diagnostics - the fixed code registry and the collection rules.
//!
//! Every user-visible error carries a `DiagnosticCode` from the registry in
//! [`data`]. A compilation collects diagnostics into a [`DiagnosticBag`] and
//! aborts after 100 errors or on the first `Critical`.

pub mod data;

use crate::span::Span;
use serde::{Deserialize, Serialize};

pub use data::diagnostic_codes;

/// How many errors a compilation tolerates before giving up.
pub const MAX_ERRORS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

/// A single reported problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: u32,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: u32, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: data::severity_of(code),
            span,
            message: message.into(),
        }
    }

    pub fn error(code: u32, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            span,
            message: message.into(),
        }
    }

    /// Render as `GL123: message (line:col)`.
    pub fn display_code(&self) -> String {
        format!("GL{:03}", self.code)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.display_code(), self.message, self.span)
    }
}

/// Ordered collection of diagnostics with the abort rules applied.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    saturated: bool,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Reports past the saturation point are dropped.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if self.saturated {
            return;
        }
        if diagnostic.severity >= Severity::Error {
            self.error_count += 1;
        }
        let critical = diagnostic.severity == Severity::Critical;
        self.diagnostics.push(diagnostic);
        if critical || self.error_count >= MAX_ERRORS {
            self.saturated = true;
        }
    }

    pub fn error(&mut self, code: u32, span: Span, message: impl Into<String>) {
        self.report(Diagnostic::error(code, span, message));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// True once the 100-error cap was hit or a critical was reported.
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Move all diagnostics from `other` into this bag, re-applying the
    /// saturation rules.
    pub fn absorb(&mut self, other: DiagnosticBag) {
        for diagnostic in other.diagnostics {
            self.report(diagnostic);
        }
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Render the collected diagnostics as a JSON array, for tooling.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.diagnostics).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Substitute `{0}`, `{1}`, ... in a registry template.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

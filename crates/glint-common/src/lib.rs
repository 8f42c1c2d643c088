//! Common types and utilities for the Glint compiler.
//!
//! This crate provides:
//! - `Span` / `SourceId` - Source location tracking
//! - `Identifiers` / `Istr` - Interned identifier names
//! - `Number` / `NumberKind` - The numeric tower used by literals and IL immediates
//! - `Diagnostic` / `DiagnosticBag` - The diagnostic registry and collection rules
//! - `SymbolHandle` - Weak-index handles into symbol tables

pub mod diagnostics;
pub mod handle;
pub mod interner;
pub mod numeric;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, Severity, diagnostic_codes};
pub use handle::{AssemblyId, IndexCell, SymbolHandle};
pub use interner::{Identifiers, Istr, intern};
pub use numeric::{Number, NumberKind};
pub use span::{SourceId, Span};

//! The fixed diagnostic registry.
//!
//! Codes are grouped by pipeline stage: 0xx lexical/syntactic (reported by
//! the external front-end through the same registry), 1xx symbols, 2xx types,
//! 3xx semantics, 4xx assembly I/O, 9xx critical.

use super::Severity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub severity: Severity,
    pub template: &'static str,
}

pub mod diagnostic_codes {
    // Lexical / syntactic.
    pub const INVALID_TOKEN: u32 = 1;
    pub const EXPECTED_TOKEN: u32 = 2;

    // Symbols.
    pub const REDEFINITION: u32 = 100;
    pub const SYMBOL_NOT_FOUND: u32 = 101;
    pub const SYMBOL_KIND_MISMATCH: u32 = 102;
    pub const AMBIGUOUS_SYMBOL: u32 = 103;
    pub const MEMBER_NOT_FOUND: u32 = 104;
    pub const MEMBER_TYPE_UNRESOLVED: u32 = 105;

    // Types.
    pub const TYPE_MISMATCH: u32 = 200;
    pub const NO_OPERATOR_OVERLOAD: u32 = 201;
    pub const AMBIGUOUS_CALL: u32 = 202;
    pub const NO_IMPLICIT_CONVERSION: u32 = 203;
    pub const NOT_ASSIGNABLE: u32 = 204;
    pub const NO_MATCHING_OVERLOAD: u32 = 205;
    pub const RETURN_TYPE_MISMATCH: u32 = 206;
    pub const INVALID_SWIZZLE: u32 = 207;
    pub const NO_EXPLICIT_CONVERSION: u32 = 208;

    // Semantics.
    pub const USE_BEFORE_DECLARATION: u32 = 300;
    pub const SELF_INITIALIZER: u32 = 301;

    // Assembly I/O.
    pub const ASSEMBLY_NOT_FOUND: u32 = 400;
    pub const ASSEMBLY_PARSE_ERROR: u32 = 401;
    pub const ASSEMBLY_VERSION_MISMATCH: u32 = 402;

    // Critical.
    pub const TOO_MANY_ERRORS: u32 = 900;
    pub const INTERNAL_ERROR: u32 = 901;
}

use diagnostic_codes as c;

pub const DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: c::INVALID_TOKEN,
        severity: Severity::Error,
        template: "invalid token '{0}'",
    },
    DiagnosticMessage {
        code: c::EXPECTED_TOKEN,
        severity: Severity::Error,
        template: "expected '{0}'",
    },
    DiagnosticMessage {
        code: c::REDEFINITION,
        severity: Severity::Error,
        template: "redefinition of symbol '{0}'",
    },
    DiagnosticMessage {
        code: c::SYMBOL_NOT_FOUND,
        severity: Severity::Error,
        template: "symbol not found '{0}'",
    },
    DiagnosticMessage {
        code: c::SYMBOL_KIND_MISMATCH,
        severity: Severity::Error,
        template: "symbol '{0}' is a {1}, but a {2} was expected",
    },
    DiagnosticMessage {
        code: c::AMBIGUOUS_SYMBOL,
        severity: Severity::Error,
        template: "reference to '{0}' is ambiguous",
    },
    DiagnosticMessage {
        code: c::MEMBER_NOT_FOUND,
        severity: Severity::Error,
        template: "couldn't resolve member '{0}'",
    },
    DiagnosticMessage {
        code: c::MEMBER_TYPE_UNRESOLVED,
        severity: Severity::Error,
        template: "couldn't resolve type of member '{0}'",
    },
    DiagnosticMessage {
        code: c::TYPE_MISMATCH,
        severity: Severity::Error,
        template: "type mismatch: expected '{0}', found '{1}'",
    },
    DiagnosticMessage {
        code: c::NO_OPERATOR_OVERLOAD,
        severity: Severity::Error,
        template: "couldn't find operator '{0}' for '{1}' and '{2}'",
    },
    DiagnosticMessage {
        code: c::AMBIGUOUS_CALL,
        severity: Severity::Error,
        template: "ambiguous call to '{0}'",
    },
    DiagnosticMessage {
        code: c::NO_IMPLICIT_CONVERSION,
        severity: Severity::Error,
        template: "no implicit conversion from '{0}' to '{1}'",
    },
    DiagnosticMessage {
        code: c::NOT_ASSIGNABLE,
        severity: Severity::Error,
        template: "expression is not assignable",
    },
    DiagnosticMessage {
        code: c::NO_MATCHING_OVERLOAD,
        severity: Severity::Error,
        template: "no overload of '{0}' matches the argument list",
    },
    DiagnosticMessage {
        code: c::RETURN_TYPE_MISMATCH,
        severity: Severity::Error,
        template: "cannot convert return expression from '{0}' to '{1}'",
    },
    DiagnosticMessage {
        code: c::INVALID_SWIZZLE,
        severity: Severity::Error,
        template: "invalid swizzle pattern '{0}' for type '{1}'",
    },
    DiagnosticMessage {
        code: c::NO_EXPLICIT_CONVERSION,
        severity: Severity::Error,
        template: "no conversion from '{0}' to '{1}'",
    },
    DiagnosticMessage {
        code: c::USE_BEFORE_DECLARATION,
        severity: Severity::Error,
        template: "use of variable '{0}' before its declaration",
    },
    DiagnosticMessage {
        code: c::SELF_INITIALIZER,
        severity: Severity::Error,
        template: "variable '{0}' referenced in its own initializer",
    },
    DiagnosticMessage {
        code: c::ASSEMBLY_NOT_FOUND,
        severity: Severity::Error,
        template: "referenced assembly '{0}' was not found",
    },
    DiagnosticMessage {
        code: c::ASSEMBLY_PARSE_ERROR,
        severity: Severity::Error,
        template: "referenced assembly '{0}' is malformed",
    },
    DiagnosticMessage {
        code: c::ASSEMBLY_VERSION_MISMATCH,
        severity: Severity::Error,
        template: "referenced assembly '{0}' has an unsupported version",
    },
    DiagnosticMessage {
        code: c::TOO_MANY_ERRORS,
        severity: Severity::Critical,
        template: "too many errors, aborting",
    },
    DiagnosticMessage {
        code: c::INTERNAL_ERROR,
        severity: Severity::Critical,
        template: "internal error: {0}",
    },
];

pub fn message_template(code: u32) -> Option<&'static str> {
    DIAGNOSTIC_MESSAGES
        .iter()
        .find(|m| m.code == code)
        .map(|m| m.template)
}

pub fn severity_of(code: u32) -> Severity {
    DIAGNOSTIC_MESSAGES
        .iter()
        .find(|m| m.code == code)
        .map_or(Severity::Error, |m| m.severity)
}

//! Error types for the directive compiler.
//!
//! This module defines all error types used throughout the crate,
//! organized by the phase that produces them. Every error carries the
//! zero-based, function-relative line it was detected on.

use thiserror::Error;
use crate::ir::DirectiveKind;
use std::fmt;

/// Top-level error type for the compiler.
#[derive(Error, Debug)]
pub enum AccError {
    /// A clause is unknown, not allowed on its directive, or forbidden by an ancestor
    #[error("Invalid clause: {0}")]
    InvalidClause(#[from] InvalidClauseError),

    /// An annotation or the code it governs is structurally malformed
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A backend has no generator for a node kind
    #[error("Not implemented: {0}")]
    NotImplemented(#[from] NotImplementedError),

    /// A generator could not produce code for a well-formed node
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Internal consistency failure (a builder bug, not user input)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccError {
    /// The line the error was detected on, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            AccError::InvalidClause(e) => Some(e.line),
            AccError::Syntax(e) => Some(e.line),
            AccError::NotImplemented(e) => Some(e.line),
            AccError::Codegen(e) => Some(e.line),
            AccError::Internal(_) | AccError::Io(_) => None,
        }
    }
}

/// A clause that cannot be accepted where it was written.
#[derive(Error, Debug, Clone)]
pub struct InvalidClauseError {
    /// The error message
    pub message: String,
    /// Line of the owning annotation
    pub line: usize,
    /// The offending clause token
    pub clause: String,
    /// Legal alternatives, if the clause was not recognized
    pub expected: Vec<String>,
    /// The kind of clause error
    pub kind: InvalidClauseKind,
}

impl InvalidClauseError {
    /// Create a new invalid-clause error.
    pub fn new(
        kind: InvalidClauseKind,
        line: usize,
        clause: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            line,
            clause: clause.into(),
            expected: Vec::new(),
            kind,
        }
    }

    /// Attach the list of legal alternatives.
    pub fn with_expected<I, S>(mut self, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = expected.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for InvalidClauseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)?;
        if !self.expected.is_empty() {
            write!(f, " (expected one of: {})", self.expected.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidClauseKind {
    /// Keyword is not a clause of this directive (or is misspelled)
    Unrecognized,
    /// Clause is forbidden by the enclosing compute construct
    AncestorConflict,
    /// Clause may appear at most once
    Duplicate,
    /// Clause cannot be combined with another clause on the same directive
    Conflicting,
    /// Required clause is missing
    Missing,
}

/// Structural error in an annotation or in the code it governs.
#[derive(Error, Debug, Clone)]
pub struct SyntaxError {
    /// The error message
    pub message: String,
    /// Line the error was detected on
    pub line: usize,
    /// The kind of syntax error
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    /// Create a new syntax error.
    pub fn new(kind: SyntaxErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
            kind,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Annotation has no directive keyword
    MissingDirective,
    /// Directive keyword is not known
    UnknownDirective,
    /// Parentheses in the annotation do not balance
    UnbalancedParens,
    /// Clause argument is missing or malformed
    InvalidArgument,
    /// Fewer tightly nested loops than requested
    LoopCountMismatch,
    /// An associated loop has no statically countable trip range
    UncountableLoop,
    /// An explicit block was opened but never closed
    UnterminatedBlock,
    /// Directive governs a statement but none follows it
    MissingStatement,
}

/// A node kind without a registered generator.
#[derive(Error, Debug, Clone)]
pub struct NotImplementedError {
    /// The unhandled directive kind
    pub kind: DirectiveKind,
    /// Line of the node
    pub line: usize,
    /// Name of the backend that was asked
    pub backend: String,
}

impl fmt::Display for NotImplementedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backend `{}` has no generator for `{}` directives at line {}",
            self.backend, self.kind, self.line
        )
    }
}

/// Error during code generation.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// Line of the node being generated
    pub line: usize,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl CodegenError {
    /// Create a new codegen error.
    pub fn new(kind: CodegenErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line,
            kind,
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.message, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// Governed code does not have the shape the generator needs
    UnsupportedShape,
    /// Clause is understood but the backend cannot honour it
    UnsupportedFeature,
    /// Two rewrites claim overlapping body lines
    OverlappingRewrite,
}

/// Result type using AccError.
pub type AccResult<T> = Result<T, AccError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_clause_display() {
        let err = InvalidClauseError::new(
            InvalidClauseKind::Unrecognized,
            3,
            "bogus_clause",
            "clause `bogus_clause` is not allowed on `loop`",
        )
        .with_expected(["collapse", "gang"]);
        let s = err.to_string();
        assert!(s.contains("bogus_clause"));
        assert!(s.contains("line 3"));
        assert!(s.contains("collapse, gang"));
    }

    #[test]
    fn test_error_line() {
        let err: AccError =
            SyntaxError::new(SyntaxErrorKind::LoopCountMismatch, 7, "expected 3 loops, found 2").into();
        assert_eq!(err.line(), Some(7));
        assert!(err.to_string().contains("expected 3 loops, found 2"));
        assert_eq!(AccError::Internal("x".into()).line(), None);
    }
}

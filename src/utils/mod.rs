//! Utility modules for the directive compiler.
//!
//! This module contains common utilities used throughout the codebase:
//! - Error types
//! - Line-oriented source model
//! - Identifier scanning
//! - Pretty printing and code formatting

pub mod errors;
pub mod idents;
pub mod pretty;
pub mod source;

// Re-exports
pub use errors::*;
pub use idents::{assigned_names, is_identifier, referenced_variables};
pub use pretty::{CodeFormatter, PrettyPrint};
pub use source::{LineInfo, LineKind, SourceText};

//! Directive scanner.
//!
//! Finds annotation lines in a block of source. An annotation is a comment
//! of the form `# acc <directive> ...` or `# pragma acc <directive> ...`,
//! recognized regardless of leading whitespace. Lines that begin inside a
//! multi-line string literal are never annotations.

use crate::utils::errors::{AccError, AccResult};
use crate::utils::source::SourceText;
use once_cell::sync::Lazy;
use regex::Regex;

/// Framework keyword used when none is configured.
pub const DEFAULT_FRAMEWORK: &str = "acc";

static DEFAULT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&marker_pattern(DEFAULT_FRAMEWORK)).unwrap()
});

fn marker_pattern(framework: &str) -> String {
    format!(r"^\s*#\s*(?:pragma\s+)?{}(?:\s+|$)", regex::escape(framework))
}

/// One annotation line found by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAnnotation<'s> {
    /// Zero-based line number
    pub line: usize,
    /// The whole line, verbatim
    pub text: &'s str,
    /// Everything after the framework keyword
    pub body: &'s str,
}

/// Recognizes annotation lines for one framework keyword.
#[derive(Debug, Clone)]
pub struct Scanner {
    marker: Regex,
}

impl Scanner {
    /// A scanner for the default `acc` keyword.
    pub fn new() -> Self {
        Self { marker: DEFAULT_MARKER.clone() }
    }

    /// A scanner for a custom framework keyword.
    pub fn with_framework(framework: &str) -> AccResult<Self> {
        if framework == DEFAULT_FRAMEWORK {
            return Ok(Self::new());
        }
        if framework.trim().is_empty() || framework.chars().any(char::is_whitespace) {
            return Err(AccError::Internal(format!(
                "framework keyword `{}` must be a single word",
                framework
            )));
        }
        let marker = Regex::new(&marker_pattern(framework))
            .map_err(|e| AccError::Internal(format!("bad framework keyword: {}", e)))?;
        Ok(Self { marker })
    }

    /// If `line` is an annotation, the text after the framework keyword.
    pub fn match_line<'s>(&self, line: &'s str) -> Option<&'s str> {
        self.marker.find(line).map(|m| line[m.end()..].trim_end())
    }

    /// Annotations in `source`, in strictly increasing line order.
    ///
    /// The returned iterator is lazy; calling `scan` again restarts it.
    pub fn scan<'a, 's>(&'a self, source: &'s SourceText) -> Annotations<'a, 's> {
        Annotations { scanner: self, source, next: 0 }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the annotations of one source.
#[derive(Debug, Clone)]
pub struct Annotations<'a, 's> {
    scanner: &'a Scanner,
    source: &'s SourceText,
    next: usize,
}

impl<'a, 's> Iterator for Annotations<'a, 's> {
    type Item = RawAnnotation<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.source.len() {
            let line = self.next;
            self.next += 1;
            if self.source.info(line).map_or(true, |i| i.in_string) {
                continue;
            }
            let Some(text) = self.source.line(line) else { continue };
            if let Some(body) = self.scanner.match_line(text) {
                return Some(RawAnnotation { line, text, body });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_forms() {
        let scanner = Scanner::new();
        assert_eq!(scanner.match_line("# acc loop"), Some("loop"));
        assert_eq!(scanner.match_line("    #acc parallel loop  "), Some("parallel loop"));
        assert_eq!(scanner.match_line("# pragma acc wait"), Some("wait"));
        assert_eq!(scanner.match_line("# acc"), Some(""));
        assert_eq!(scanner.match_line("# accumulate"), None);
        assert_eq!(scanner.match_line("x = 1  # acc loop"), None);
        assert_eq!(scanner.match_line("# comment about acc"), None);
    }

    #[test]
    fn test_scan_order_and_restart() {
        let src = SourceText::new("def f():\n    # acc parallel\n    x = 1\n    # acc loop\n");
        let scanner = Scanner::new();
        let lines: Vec<usize> = scanner.scan(&src).map(|a| a.line).collect();
        assert_eq!(lines, vec![1, 3]);
        let again: Vec<usize> = scanner.scan(&src).map(|a| a.line).collect();
        assert_eq!(lines, again);
    }

    #[test]
    fn test_skips_string_literals() {
        let src = SourceText::new("doc = '''\n# acc loop\n'''\n# acc wait");
        let found: Vec<_> = Scanner::new().scan(&src).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 3);
        assert_eq!(found[0].body, "wait");
    }

    #[test]
    fn test_custom_framework() {
        let scanner = Scanner::with_framework("omp").unwrap();
        assert_eq!(scanner.match_line("# omp parallel"), Some("parallel"));
        assert_eq!(scanner.match_line("# acc parallel"), None);
        assert!(Scanner::with_framework("two words").is_err());
    }
}

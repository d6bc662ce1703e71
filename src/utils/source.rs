//! Line-oriented model of indentation-scoped host source.
//!
//! Directives, regions and tree positions are all expressed in zero-based
//! line numbers relative to the start of the function source. This module
//! precomputes, per line, what the rest of the frontend needs to reason
//! about block scope without a full host-language parser: indentation
//! depth, whether the line is blank, a comment, or code, and whether the
//! line sits inside a bracketed or string continuation of an earlier line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Default tab stop used when measuring indentation.
pub const DEFAULT_TAB_WIDTH: usize = 8;

/// Classification of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    /// Only whitespace
    Blank,
    /// Starts with a comment marker (annotations are comments too)
    Comment,
    /// Anything else
    Code,
}

/// Per-line facts computed once for the whole source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    /// Indentation width in columns (tabs expanded)
    pub indent: usize,
    /// Line classification
    pub kind: LineKind,
    /// Line begins inside a multi-line string literal
    pub in_string: bool,
    /// Line continues the statement started on an earlier line
    pub continuation: bool,
    /// Statement is still open at the end of this line
    pub continues: bool,
}

impl LineInfo {
    /// True for blank and comment lines, which never start a statement.
    pub fn is_trivia(&self) -> bool {
        !self.in_string && matches!(self.kind, LineKind::Blank | LineKind::Comment)
    }

    /// True when the line starts a new logical statement.
    pub fn starts_statement(&self) -> bool {
        self.kind == LineKind::Code && !self.continuation
    }
}

/// A block of host source split into lines with scope facts attached.
#[derive(Debug, Clone)]
pub struct SourceText {
    lines: Vec<String>,
    info: Vec<LineInfo>,
    tab_width: usize,
}

impl SourceText {
    /// Analyze the given source using the default tab width.
    pub fn new(source: &str) -> Self {
        Self::with_tab_width(source, DEFAULT_TAB_WIDTH)
    }

    /// Analyze the given source with an explicit tab width.
    pub fn with_tab_width(source: &str, tab_width: usize) -> Self {
        let tab_width = tab_width.max(1);
        let lines: Vec<String> = source.lines().map(str::to_string).collect();
        let mut scanner = LineScanner::default();
        let info = lines
            .iter()
            .map(|line| scanner.scan(line, tab_width))
            .collect();
        Self { lines, info, tab_width }
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when there are no lines at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Tab width used for indentation measurement.
    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    /// Get a line of source code.
    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    /// Get the scope facts for a line.
    pub fn info(&self, line: usize) -> Option<&LineInfo> {
        self.info.get(line)
    }

    /// Indentation of a line, if it exists.
    pub fn indent(&self, line: usize) -> Option<usize> {
        self.info.get(line).map(|i| i.indent)
    }

    /// All lines, in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(String::as_str)
    }

    /// The lines of a half-open range, clamped to the source.
    pub fn slice(&self, range: Range<usize>) -> &[String] {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        &self.lines[start..end]
    }

    /// The text of a half-open line range joined with newlines.
    pub fn text(&self, range: Range<usize>) -> String {
        self.slice(range).join("\n")
    }

    /// Last line of the logical statement starting at `line`.
    pub fn statement_end(&self, line: usize) -> usize {
        let mut end = line;
        while end + 1 < self.len() && self.info[end].continues {
            end += 1;
        }
        end
    }

    /// Next line at or after `from` that starts a statement.
    pub fn next_statement(&self, from: usize) -> Option<usize> {
        (from..self.len()).find(|&l| self.info[l].starts_statement())
    }
}

impl fmt::Display for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            writeln!(f, "{:>4} | {}", i, line)?;
        }
        Ok(())
    }
}

/// Measure the indentation of a line, expanding tabs to `tab_width` stops.
pub fn measure_indent(line: &str, tab_width: usize) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += tab_width - (width % tab_width),
            _ => break,
        }
    }
    width
}

/// Split `s` on `sep` where it occurs outside any brackets.
///
/// Pieces are returned untrimmed; an empty input yields one empty piece.
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Carries string and bracket state from one line to the next.
#[derive(Debug, Default)]
struct LineScanner {
    depth: usize,
    triple: Option<char>,
    open: bool,
}

impl LineScanner {
    fn scan(&mut self, line: &str, tab_width: usize) -> LineInfo {
        let in_string = self.triple.is_some();
        let continuation = self.open;
        let trimmed = line.trim_start();
        let kind = if in_string {
            LineKind::Code
        } else if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with('#') {
            LineKind::Comment
        } else {
            LineKind::Code
        };

        let backslash = self.consume(line);
        let continues = self.depth > 0 || self.triple.is_some() || backslash;
        self.open = continues;

        LineInfo {
            indent: measure_indent(line, tab_width),
            kind,
            in_string,
            continuation,
            continues,
        }
    }

    /// Update bracket/string state; returns true if the line ends in an
    /// explicit backslash continuation.
    fn consume(&mut self, line: &str) -> bool {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        let mut last_code = None;
        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = self.triple {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                    self.triple = None;
                    i += 3;
                    continue;
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' => {
                    if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                        self.triple = Some(c);
                        i += 3;
                        continue;
                    }
                    i += 1;
                    while i < chars.len() && chars[i] != c {
                        if chars[i] == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            if !c.is_whitespace() {
                last_code = Some(c);
            }
            i += 1;
        }
        self.triple.is_none() && last_code == Some('\\')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_with_tabs() {
        assert_eq!(measure_indent("    x", 8), 4);
        assert_eq!(measure_indent("\tx", 8), 8);
        assert_eq!(measure_indent("  \tx", 4), 4);
        assert_eq!(measure_indent("", 8), 0);
    }

    #[test]
    fn test_line_kinds() {
        let src = SourceText::new("def f():\n\n    # comment\n    x = 1");
        assert_eq!(src.len(), 4);
        assert_eq!(src.info(0).unwrap().kind, LineKind::Code);
        assert_eq!(src.info(1).unwrap().kind, LineKind::Blank);
        assert_eq!(src.info(2).unwrap().kind, LineKind::Comment);
        assert_eq!(src.indent(3), Some(4));
    }

    #[test]
    fn test_bracket_continuation() {
        let src = SourceText::new("x = foo(a,\nb)\ny = 2");
        assert!(src.info(0).unwrap().continues);
        assert!(src.info(1).unwrap().continuation);
        assert!(!src.info(2).unwrap().continuation);
        assert_eq!(src.statement_end(0), 1);
    }

    #[test]
    fn test_triple_quoted_string() {
        let src = SourceText::new("s = \"\"\"\n# acc loop\n\"\"\"\nz = 1");
        assert!(src.info(1).unwrap().in_string);
        assert_eq!(src.info(1).unwrap().kind, LineKind::Code);
        assert!(!src.info(3).unwrap().in_string);
        assert_eq!(src.next_statement(1), Some(3));
    }

    #[test]
    fn test_brackets_in_strings_and_comments_ignored() {
        let src = SourceText::new("x = '('  # )\ny = 1");
        assert!(!src.info(0).unwrap().continues);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("a, f(b, c), d[1,2]", ','), vec!["a", " f(b, c)", " d[1,2]"]);
        assert_eq!(split_top_level("", ','), vec![""]);
    }

    #[test]
    fn test_backslash_continuation() {
        let src = SourceText::new("x = 1 + \\\n  2\ny = 3");
        assert!(src.info(0).unwrap().continues);
        assert_eq!(src.statement_end(0), 1);
    }
}

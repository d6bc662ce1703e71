//! Pretty printing and code formatting utilities.
//!
//! `PrettyPrint` renders the directive tree for humans; `CodeFormatter`
//! and the indentation helpers are what backends use to emit host source.

use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use std::fmt;

/// Default line width for pretty printing.
pub const DEFAULT_WIDTH: usize = 80;

/// A pretty-printable value.
pub trait PrettyPrint {
    /// Convert to a pretty document.
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D>;

    /// Render into `out` with the given width.
    fn write_pretty<W: fmt::Write>(&self, width: usize, out: &mut W) -> fmt::Result {
        let allocator = BoxAllocator;
        let doc = self.to_doc(&allocator);
        doc.render_fmt(width, out)
    }

    /// Pretty print to a string with the given width.
    fn pretty_print(&self, width: usize) -> String {
        Pretty { value: self, width }.to_string()
    }

    /// Pretty print with default width.
    fn pretty(&self) -> String {
        self.pretty_print(DEFAULT_WIDTH)
    }
}

/// Display adapter that renders a [`PrettyPrint`] value at a fixed width.
pub struct Pretty<'v, T: ?Sized> {
    value: &'v T,
    width: usize,
}

impl<T: PrettyPrint + ?Sized> fmt::Display for Pretty<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.write_pretty(self.width, f)
    }
}

/// Indent a block of text.
pub fn indent(s: &str, spaces: usize) -> String {
    let indent_str = " ".repeat(spaces);
    s.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", indent_str, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Left-justify a block of lines, keeping relative indentation.
///
/// Blank lines do not take part in computing the common margin.
pub fn dedent_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let margin = lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            let l = l.as_ref();
            if l.trim().is_empty() {
                String::new()
            } else {
                l[margin.min(l.len() - l.trim_start_matches(' ').len())..].to_string()
            }
        })
        .collect()
}

/// Left-justify a block of text.
pub fn dedent(s: &str) -> String {
    let lines: Vec<&str> = s.lines().collect();
    dedent_lines(&lines).join("\n")
}

/// A simple code formatter for generated code.
#[derive(Debug)]
pub struct CodeFormatter {
    output: String,
    indent_level: usize,
    indent_str: String,
    at_line_start: bool,
}

impl CodeFormatter {
    /// Create a new formatter with the given indent string.
    pub fn new(indent_str: &str) -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            indent_str: indent_str.to_string(),
            at_line_start: true,
        }
    }

    /// Create a formatter with the host language's customary 4 spaces.
    pub fn default_indent() -> Self {
        Self::new("    ")
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write text.
    pub fn write(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.output.push('\n');
                self.at_line_start = true;
            } else {
                if self.at_line_start {
                    for _ in 0..self.indent_level {
                        self.output.push_str(&self.indent_str);
                    }
                    self.at_line_start = false;
                }
                self.output.push(c);
            }
        }
    }

    /// Write a line.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.write("\n");
    }

    /// Write every line of a multi-line block at the current indentation.
    /// Blank lines stay empty.
    pub fn write_block(&mut self, block: &str) {
        for line in block.lines() {
            if line.trim().is_empty() {
                self.newline();
            } else {
                self.writeln(line);
            }
        }
    }

    /// Write an empty line.
    pub fn newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
    }

    /// Write a block introduced by `header:` with an indented body.
    pub fn block<F: FnOnce(&mut Self)>(&mut self, header: &str, f: F) {
        self.write(header);
        self.writeln(":");
        self.indent();
        f(self);
        self.dedent();
    }

    /// Get the formatted output.
    pub fn finish(self) -> String {
        self.output
    }
}

/// Format a list with separators.
pub fn format_list<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_formatter() {
        let mut fmt = CodeFormatter::default_indent();
        fmt.block("def execute(ls)", |f| {
            f.writeln("x = 1");
            f.writeln("return x");
        });

        let output = fmt.finish();
        assert_eq!(output, "def execute(ls):\n    x = 1\n    return x\n");
    }

    #[test]
    fn test_write_block_keeps_blank_lines_empty() {
        let mut fmt = CodeFormatter::default_indent();
        fmt.indent();
        fmt.write_block("a = 1\n\nb = 2");
        assert_eq!(fmt.finish(), "    a = 1\n\n    b = 2\n");
    }

    #[test]
    fn test_indent_helper() {
        let text = "line1\nline2\nline3";
        let indented = indent(text, 4);
        assert!(indented.starts_with("    line1"));
    }

    #[test]
    fn test_dedent() {
        let text = "    for x in ls:\n        y(x)\n\n    z()";
        assert_eq!(dedent(text), "for x in ls:\n    y(x)\n\nz()");
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(&["a", "b"], ", "), "a, b");
    }
}

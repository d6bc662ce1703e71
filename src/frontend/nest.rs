//! Loop-nest analysis for `collapse` and `tile`.
//!
//! Both clauses associate a directive with a number of tightly nested
//! `for` loops at the start of its governed region. A nest is tight when
//! each loop's body consists solely of the next loop.

use crate::frontend::region::statement_extent;
use crate::ir::clause::AssociatedLoop;
use crate::ir::node::SourceRegion;
use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::idents::referenced_variables;
use crate::utils::pretty::dedent_lines;
use crate::utils::source::SourceText;
use once_cell::sync::Lazy;
use regex::Regex;

/// Iterables whose trip count is known before the loop runs, other than
/// `range(...)` calls and bracketed literals.
static COUNTABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*(\[[^\]]*\])*$").unwrap()
});

/// Header of a `for` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForHeader {
    pub target: String,
    pub iterable: String,
}

/// Parse a `for target in iterable:` header. Returns `None` for any other
/// statement.
pub fn parse_for_header(statement: &str) -> Option<ForHeader> {
    let code = strip_comment(statement.trim());
    let rest = code.strip_prefix("for")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let in_at = find_top_level(rest, " in ")?;
    let target = rest[..in_at].trim();
    let after = &rest[in_at + 4..];
    let colon = find_top_level(after, ":")?;
    let iterable = after[..colon].trim();
    if target.is_empty() || iterable.is_empty() {
        return None;
    }
    Some(ForHeader {
        target: target.to_string(),
        iterable: iterable.to_string(),
    })
}

/// Whether a loop over `iterable` has a statically known trip count.
pub fn is_countable(iterable: &str) -> bool {
    let it = iterable.trim();
    if it.starts_with("range(") && it.ends_with(')') {
        return true;
    }
    if (it.starts_with('[') && it.ends_with(']')) || (it.starts_with('(') && it.ends_with(')')) {
        return true;
    }
    COUNTABLE_NAME.is_match(it)
}

/// Collect the `count` tightly nested loops at the start of `region`.
///
/// The nest must be exactly `count` loops deep: fails with "expected n
/// loops, found m" otherwise, and names the line of any loop without a
/// countable iterable.
pub fn associated_loops(
    source: &SourceText,
    region: SourceRegion,
    count: usize,
    directive_line: usize,
) -> AccResult<Vec<AssociatedLoop>> {
    let nest = tight_nest(source, region);
    if nest.len() != count {
        return Err(SyntaxError::new(
            SyntaxErrorKind::LoopCountMismatch,
            directive_line,
            format!("expected {} loops, found {}", count, nest.len()),
        )
        .into());
    }

    nest.into_iter()
        .map(|(line, header, end)| {
            if !is_countable(&header.iterable) {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UncountableLoop,
                    line,
                    format!("loop over `{}` has no countable trip range", header.iterable),
                )
                .into());
            }
            let text = dedent_lines(source.slice(line..end)).join("\n");
            Ok(AssociatedLoop {
                line,
                variables: referenced_variables(&text),
                source: text,
                target: header.target,
                iterable: header.iterable,
            })
        })
        .collect()
}

/// The tight `for` nest at the start of `region`, outermost first, as
/// `(line, header, extent end)`.
///
/// A loop joins the nest when it is the first statement of the enclosing
/// loop's body and the last code line of both is the same.
fn tight_nest(source: &SourceText, region: SourceRegion) -> Vec<(usize, ForHeader, usize)> {
    let mut nest = Vec::new();
    let mut at = source.next_statement(region.start_line).filter(|&l| l < region.end_line);
    let mut enclosing_code_end = None;

    while let Some(line) = at {
        let header_end = source.statement_end(line);
        let Some(header) = parse_for_header(&source.text(line..header_end + 1)) else {
            break;
        };
        let end = statement_extent(source, line);
        let code_end = code_end(source, line, end);
        if enclosing_code_end.map_or(false, |e| e != code_end) {
            break;
        }
        nest.push((line, header, end));
        enclosing_code_end = Some(code_end);
        at = source.next_statement(header_end + 1).filter(|&l| l < end);
    }
    nest
}

/// Exclusive end of `[first, end)` without its trailing blank and comment lines.
fn code_end(source: &SourceText, first: usize, end: usize) -> usize {
    (first + 1..end)
        .rev()
        .find(|&l| source.info(l).map_or(false, |i| !i.is_trivia()))
        .map_or(first + 1, |l| l + 1)
}

/// Cut a trailing `# comment` that is outside any string literal.
fn strip_comment(code: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '#' => return code[..i].trim_end(),
            None => {}
        }
    }
    code
}

/// Byte offset of `needle` in `haystack` outside brackets.
fn find_top_level(haystack: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in haystack.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && haystack[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}

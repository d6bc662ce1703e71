//! Region extraction.
//!
//! Maps an annotation line to the half-open span of lines it governs. Two
//! strategies exist: scope inference from indentation, and explicit
//! delimiter blocks written as comment lines (`#{` ... `#}` by default).

use crate::ir::directive::{DirectiveKind, RegionStrategy};
use crate::ir::node::SourceRegion;
use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::source::{LineKind, SourceText};
use serde::{Deserialize, Serialize};

/// Comment markers that open and close an explicit block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMarkers {
    pub open: String,
    pub close: String,
}

impl Default for BlockMarkers {
    fn default() -> Self {
        Self { open: "{".to_string(), close: "}".to_string() }
    }
}

impl BlockMarkers {
    fn matches(marker: &str, line: &str) -> bool {
        line.trim()
            .strip_prefix('#')
            .map_or(false, |rest| rest.trim() == marker)
    }

    pub fn is_open(&self, line: &str) -> bool {
        Self::matches(&self.open, line)
    }

    pub fn is_close(&self, line: &str) -> bool {
        Self::matches(&self.close, line)
    }
}

/// A governed region and how it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    pub region: SourceRegion,
    /// Found through explicit block markers
    pub delimited: bool,
}

/// Extracts regions from one source.
#[derive(Debug, Clone)]
pub struct RegionExtractor<'s> {
    source: &'s SourceText,
    markers: &'s BlockMarkers,
}

impl<'s> RegionExtractor<'s> {
    pub fn new(source: &'s SourceText, markers: &'s BlockMarkers) -> Self {
        Self { source, markers }
    }

    /// The region governed by a `kind` annotation on `line`, or `None` for
    /// standalone directives.
    pub fn extract(&self, line: usize, kind: DirectiveKind) -> AccResult<Option<Extracted>> {
        match kind.region_strategy() {
            RegionStrategy::None => Ok(None),
            RegionStrategy::Scope => self.scope(line).map(|region| {
                Some(Extracted { region, delimited: false })
            }),
            RegionStrategy::ScopeOrDelimiter => {
                if let Some(region) = self.delimited(line)? {
                    return Ok(Some(Extracted { region, delimited: true }));
                }
                self.scope(line).map(|region| Some(Extracted { region, delimited: false }))
            }
        }
    }

    /// Scope-inferred region: the next statement after `line`, with any
    /// blank or comment lines before it.
    pub fn scope(&self, line: usize) -> AccResult<SourceRegion> {
        let missing = |msg: &str| {
            SyntaxError::new(SyntaxErrorKind::MissingStatement, line, msg.to_string())
        };
        let first = (line + 1..self.source.len())
            .find(|&l| self.source.info(l).map_or(false, |i| !i.is_trivia()))
            .ok_or_else(|| missing("directive is not followed by a statement"))?;
        let annotation_indent = self.source.indent(line).unwrap_or(0);
        if self.source.indent(first).unwrap_or(0) < annotation_indent {
            return Err(missing("directive is not followed by a statement in its block").into());
        }
        Ok(SourceRegion::new(line + 1, statement_extent(self.source, first)))
    }

    /// Delimited region, if the line after `line` opens an explicit block.
    /// The region holds the lines strictly between the matching markers.
    pub fn delimited(&self, line: usize) -> AccResult<Option<SourceRegion>> {
        let open_line = line + 1;
        match self.source.line(open_line) {
            Some(text) if self.markers.is_open(text) => {}
            _ => return Ok(None),
        }
        let mut depth = 0usize;
        for l in open_line..self.source.len() {
            if self.source.info(l).map_or(true, |i| i.in_string) {
                continue;
            }
            let text = self.source.line(l).unwrap_or("");
            if self.markers.is_open(text) {
                depth += 1;
            } else if self.markers.is_close(text) {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(SourceRegion::new(open_line + 1, l)));
                }
            }
        }
        Err(SyntaxError::new(
            SyntaxErrorKind::UnterminatedBlock,
            line,
            format!("block opened at line {} is never closed", open_line),
        )
        .into())
    }
}

/// Exclusive end of the statement starting at `first`, including its
/// indented body and any `elif`/`else`/`except`/`finally` clauses.
///
/// Comments indented past the statement belong to it; trailing blank lines
/// and shallower trailing comments do not.
pub fn statement_extent(source: &SourceText, first: usize) -> usize {
    let depth = source.indent(first).unwrap_or(0);
    let mut last = source.statement_end(first);
    let mut l = last + 1;
    while let Some(info) = source.info(l) {
        if info.in_string || info.continuation {
            last = l;
            l += 1;
            continue;
        }
        match info.kind {
            LineKind::Blank => {}
            LineKind::Comment => {
                if info.indent > depth {
                    last = l;
                }
            }
            LineKind::Code => {
                let text = source.line(l).unwrap_or("");
                if info.indent > depth || (info.indent == depth && continues_compound(text)) {
                    last = source.statement_end(l);
                    l = last + 1;
                    continue;
                }
                break;
            }
        }
        l += 1;
    }
    last + 1
}

/// Lines that continue a compound statement at its own indentation.
fn continues_compound(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["elif", "else", "except", "finally"].iter().any(|kw| {
        trimmed
            .strip_prefix(kw)
            .and_then(|rest| rest.chars().next())
            .map_or(false, |c| c == ':' || c.is_whitespace() || c == '(')
    })
}

//! Directive nodes and the source regions they govern.

use crate::ir::clause::ClauseSet;
use crate::ir::directive::DirectiveKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A half-open span of function-relative lines, `[start_line, end_line)`.
///
/// Never includes the annotation line itself, except for the root whose
/// region is the whole source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRegion {
    pub start_line: usize,
    pub end_line: usize,
}

impl SourceRegion {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self { start_line, end_line }
    }

    /// Whether `line` falls inside the region.
    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line < self.end_line
    }

    /// Whether `other` lies entirely inside this region.
    pub fn encloses(&self, other: &SourceRegion) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    /// Whether two regions share at least one line.
    pub fn overlaps(&self, other: &SourceRegion) -> bool {
        self.start_line < other.end_line && other.start_line < self.end_line
    }

    pub fn len(&self) -> usize {
        self.end_line.saturating_sub(self.start_line)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lines(&self) -> Range<usize> {
        self.start_line..self.end_line
    }
}

impl fmt::Display for SourceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_line, self.end_line)
    }
}

/// An argument written directly on the directive keyword, such as
/// `cache(a, b)`, `wait(1)`, or `routine(name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectiveArgument {
    /// `cache(var-list)`
    Vars(Vec<String>),
    /// `wait(queue, ...)`
    Queues(Vec<String>),
    /// `routine(name)`
    Name(String),
}

impl fmt::Display for DirectiveArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveArgument::Vars(v) | DirectiveArgument::Queues(v) => {
                write!(f, "({})", v.join(", "))
            }
            DirectiveArgument::Name(n) => write!(f, "({})", n),
        }
    }
}

/// One parsed directive.
///
/// Nodes are built by the parse driver and are immutable once their
/// clauses are parsed; the tree owns the parent/child links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveNode {
    pub kind: DirectiveKind,
    /// Line of the annotation (zero-based, function-relative)
    pub line: usize,
    /// Governed lines, for kinds that govern code
    pub region: Option<SourceRegion>,
    pub clauses: ClauseSet,
    pub argument: Option<DirectiveArgument>,
    /// Part of a fused `<compute> loop` annotation
    pub hybrid: bool,
    /// Region was given with explicit block markers
    pub delimited: bool,
}

impl DirectiveNode {
    pub fn new(kind: DirectiveKind, line: usize) -> Self {
        Self {
            kind,
            line,
            region: None,
            clauses: ClauseSet::new(),
            argument: None,
            hybrid: false,
            delimited: false,
        }
    }

    /// The synthetic root spanning `line_count` lines.
    pub fn root(line_count: usize) -> Self {
        let mut node = Self::new(DirectiveKind::Root, 0);
        node.region = Some(SourceRegion::new(0, line_count));
        node
    }

    pub fn with_region(mut self, region: Option<SourceRegion>) -> Self {
        self.region = region;
        self
    }

    pub fn is_root(&self) -> bool {
        self.kind == DirectiveKind::Root
    }

    /// Whether this node governs `line`.
    pub fn governs(&self, line: usize) -> bool {
        self.region.map_or(false, |r| r.contains(line))
    }
}

impl fmt::Display for DirectiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(arg) = &self.argument {
            write!(f, "{}", arg)?;
        }
        if !self.clauses.is_empty() {
            write!(f, " {}", self.clauses)?;
        }
        write!(f, " @{}", self.line)?;
        if let Some(region) = self.region {
            write!(f, " {}", region)?;
        }
        if self.hybrid {
            f.write_str(" hybrid")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::clause::{Clause, ClauseKind};

    #[test]
    fn test_region_is_half_open() {
        let r = SourceRegion::new(2, 5);
        assert!(!r.contains(1));
        assert!(r.contains(2));
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert_eq!(r.len(), 3);
        assert!(r.encloses(&SourceRegion::new(3, 5)));
        assert!(!r.overlaps(&SourceRegion::new(5, 7)));
    }

    #[test]
    fn test_root_node() {
        let root = DirectiveNode::root(10);
        assert!(root.is_root());
        assert_eq!(root.line, 0);
        assert_eq!(root.region, Some(SourceRegion::new(0, 10)));
        assert!(root.governs(9));
    }

    #[test]
    fn test_node_display() {
        let mut node = DirectiveNode::new(DirectiveKind::Loop, 3)
            .with_region(Some(SourceRegion::new(4, 6)));
        node.clauses.insert(ClauseKind::Seq, Clause::Flag);
        assert_eq!(node.to_string(), "loop seq @3 [4, 6)");
    }
}

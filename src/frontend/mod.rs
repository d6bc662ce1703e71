//! Frontend: annotation scanning, clause parsing, and tree building.
//!
//! The frontend turns the source of one function into a [`DirectiveTree`]:
//!
//! ```text
//! source ─► Scanner ─► pragma tokens ─► RegionExtractor ─► clause state machine ─► tree
//! ```
//!
//! Annotations are processed strictly in source order, so every directive
//! that could enclose a new one is already in the tree when the new one's
//! clauses are validated against its ancestors.
//!
//! ## Annotation syntax
//!
//! ```text
//! def square(ls):
//!     # acc parallel loop
//!     for x in ls:
//!         ls[x] = x * x
//!     return ls
//! ```

pub mod clauses;
pub mod nest;
pub mod pragma;
pub mod region;
pub mod scanner;

pub use clauses::{parse_clauses, ClauseContext, Cursor};
pub use pragma::{parse_pragma, tokenize, Pragma};
pub use region::{BlockMarkers, Extracted, RegionExtractor};
pub use scanner::{RawAnnotation, Scanner};

use crate::ir::clause::ClauseKind;
use crate::ir::directive::DirectiveKind;
use crate::ir::node::DirectiveNode;
use crate::ir::tree::DirectiveTree;
use crate::utils::errors::AccResult;
use crate::utils::source::SourceText;
use crate::CompileConfig;
use log::{debug, info};

/// Parses the annotations of one source into a tree.
#[derive(Debug)]
pub struct DirectiveParser<'s> {
    source: &'s SourceText,
    scanner: Scanner,
    markers: BlockMarkers,
}

impl<'s> DirectiveParser<'s> {
    pub fn new(source: &'s SourceText, config: &CompileConfig) -> AccResult<Self> {
        Ok(Self {
            source,
            scanner: Scanner::with_framework(&config.framework)?,
            markers: config.block_markers(),
        })
    }

    /// Build the directive tree. Any error discards the whole tree.
    pub fn parse(&self) -> AccResult<DirectiveTree> {
        let mut tree = DirectiveTree::new(self.source.len());
        for annotation in self.scanner.scan(self.source) {
            self.add_annotation(&mut tree, &annotation)?;
        }
        tree.validate()?;
        info!("parsed {} directives over {} lines", tree.len() - 1, self.source.len());
        Ok(tree)
    }

    fn add_annotation(&self, tree: &mut DirectiveTree, annotation: &RawAnnotation<'_>) -> AccResult<()> {
        let line = annotation.line;
        let pragma = parse_pragma(annotation.body, line)?;
        debug!(
            "line {}: `{}`{}",
            line,
            pragma.kind,
            if pragma.hybrid { " loop" } else { "" }
        );

        let extractor = RegionExtractor::new(self.source, &self.markers);
        let extracted = if pragma.hybrid {
            Some(Extracted { region: extractor.scope(line)?, delimited: false })
        } else {
            extractor.extract(line, pragma.kind)?
        };

        let mut node = DirectiveNode::new(pragma.kind, line).with_region(extracted.map(|e| e.region));
        node.delimited = extracted.map_or(false, |e| e.delimited);
        node.argument = pragma.argument.clone();
        node.hybrid = pragma.hybrid;

        let ancestors: Vec<&DirectiveNode> = tree
            .ancestors_of_line(line)
            .into_iter()
            .filter_map(|id| tree.get(id))
            .collect();

        if !pragma.hybrid {
            node.clauses = parse_clauses(&self.context(&node, &ancestors), &pragma.tokens)?;
            tree.add(node)?;
            return Ok(());
        }

        let (loop_tokens, compute_tokens) = route_hybrid(&pragma.tokens);
        node.clauses = parse_clauses(&self.context(&node, &ancestors), &compute_tokens)?;

        let mut inner = DirectiveNode::new(DirectiveKind::Loop, line).with_region(node.region);
        inner.hybrid = true;
        let chain: Vec<&DirectiveNode> = std::iter::once(&node).chain(ancestors.iter().copied()).collect();
        inner.clauses = parse_clauses(&self.context(&inner, &chain), &loop_tokens)?;

        let parent = tree.add(node)?;
        tree.add_hybrid(parent, inner)?;
        Ok(())
    }

    fn context<'a>(&'a self, node: &DirectiveNode, ancestors: &'a [&'a DirectiveNode]) -> ClauseContext<'a> {
        ClauseContext {
            kind: node.kind,
            line: node.line,
            region: node.region,
            source: self.source,
            ancestors,
        }
    }
}

/// Split the clauses of a fused `<compute> loop` annotation: clauses the
/// loop accepts go to the loop, everything else to the compute construct.
/// A detached `(...)` argument follows its keyword.
fn route_hybrid(tokens: &[String]) -> (Vec<String>, Vec<String>) {
    let mut loop_tokens = Vec::new();
    let mut compute_tokens = Vec::new();
    let mut to_loop = false;
    for token in tokens {
        if !token.starts_with('(') {
            let keyword = pragma::split_keyword(token).0;
            to_loop = ClauseKind::from_keyword(keyword)
                .map_or(false, |k| DirectiveKind::Loop.accepts(k));
        }
        if to_loop {
            loop_tokens.push(token.clone());
        } else {
            compute_tokens.push(token.clone());
        }
    }
    (loop_tokens, compute_tokens)
}

/// Parse the annotations of `source` with the given configuration.
pub fn parse_source(source: &SourceText, config: &CompileConfig) -> AccResult<DirectiveTree> {
    DirectiveParser::new(source, config)?.parse()
}

/// Parse the annotations of `source` with the default configuration.
pub fn parse(source: &str) -> AccResult<DirectiveTree> {
    let config = CompileConfig::default();
    let text = SourceText::with_tab_width(source, config.tab_width);
    parse_source(&text, &config)
}

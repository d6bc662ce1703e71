//! The directive tree.
//!
//! Nodes live in an arena addressed by [`NodeId`]. Parent/child links are
//! derived purely from line position: a new node's parent is the nearest
//! directive above it whose region contains its line and whose kind admits
//! children, or the root if there is none.

use crate::ir::directive::DirectiveKind;
use crate::ir::node::{DirectiveNode, NodeId, SourceRegion};
use crate::utils::errors::{AccError, AccResult};
use crate::utils::pretty::PrettyPrint;
use log::trace;
use pretty::{DocAllocator, DocBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Index;

/// A tree of directives rooted at a synthetic root node.
#[derive(Debug, Clone)]
pub struct DirectiveTree {
    nodes: Vec<DirectiveNode>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    /// Annotation line -> node, for every indexed (non-synthetic) node
    line_index: BTreeMap<usize, NodeId>,
    line_count: usize,
}

impl DirectiveTree {
    /// Create a tree holding only the root, spanning `line_count` lines.
    pub fn new(line_count: usize) -> Self {
        Self {
            nodes: vec![DirectiveNode::root(line_count)],
            parents: vec![None],
            children: vec![Vec::new()],
            line_index: BTreeMap::new(),
            line_count,
        }
    }

    pub fn root(&self) -> &DirectiveNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&DirectiveNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Number of source lines the root spans.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// The indexed node annotated on `line`.
    pub fn at_line(&self, line: usize) -> Option<NodeId> {
        self.line_index.get(&line).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0).copied().flatten()
    }

    /// Children in insertion (source) order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(id.0).map_or(&[], Vec::as_slice)
    }

    /// All nodes in arena order, root first.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DirectiveNode)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Find the parent a node on `line` would get.
    ///
    /// Walks annotation lines above `line`, nearest first, and picks the
    /// first whose node governs `line` and admits children.
    pub fn find_parent(&self, line: usize) -> NodeId {
        self.line_index
            .range(..line)
            .rev()
            .map(|(_, &id)| id)
            .find(|&id| {
                let candidate = &self.nodes[id.0];
                candidate.kind.admits_children() && candidate.governs(line)
            })
            .unwrap_or(NodeId::ROOT)
    }

    /// Ancestors a node on `line` would have, nearest first, ending at the root.
    /// Usable before the node is inserted.
    pub fn ancestors_of_line(&self, line: usize) -> Vec<NodeId> {
        let parent = self.find_parent(line);
        let mut chain = vec![parent];
        chain.extend(self.get_ancestors(parent));
        chain
    }

    /// Ancestors of an inserted node, nearest first, ending at the root.
    pub fn get_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            chain.push(p);
            current = self.parent(p);
        }
        chain
    }

    /// Insert a node under the parent its line selects.
    pub fn add(&mut self, node: DirectiveNode) -> AccResult<NodeId> {
        if node.is_root() {
            return Err(AccError::Internal("a tree has exactly one root".to_string()));
        }
        if node.line >= self.line_count {
            return Err(AccError::Internal(format!(
                "directive line {} is outside the source ({} lines)",
                node.line, self.line_count
            )));
        }
        if let Some(existing) = self.at_line(node.line) {
            return Err(AccError::Internal(format!(
                "line {} already holds node {}",
                node.line, existing
            )));
        }
        let parent = self.find_parent(node.line);
        let line = node.line;
        let id = self.push(parent, node);
        self.line_index.insert(line, id);
        trace!("inserted {} at line {} under {}", id, line, parent);
        Ok(id)
    }

    /// Attach the synthetic loop half of a fused `<compute> loop` annotation.
    ///
    /// The child shares the parent's line and region and is not indexed.
    pub fn add_hybrid(&mut self, parent: NodeId, node: DirectiveNode) -> AccResult<NodeId> {
        let owner = self
            .get(parent)
            .ok_or_else(|| AccError::Internal(format!("no node {}", parent)))?;
        if !owner.kind.is_compute() || owner.line != node.line || owner.region != node.region {
            return Err(AccError::Internal(format!(
                "hybrid child at line {} does not match its parent {}",
                node.line, owner
            )));
        }
        let id = self.push(parent, node);
        trace!("attached hybrid {} under {}", id, parent);
        Ok(id)
    }

    fn push(&mut self, parent: NodeId, node: DirectiveNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.parents.push(Some(parent));
        self.children.push(Vec::new());
        self.children[parent.0].push(id);
        id
    }

    /// Node ids in dispatch order: breadth-first from the root's children.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut queue: VecDeque<NodeId> = self.children(NodeId::ROOT).iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        order
    }

    /// Nearest enclosing compute construct of `id`, if any.
    pub fn compute_ancestor(&self, id: NodeId) -> Option<NodeId> {
        self.get_ancestors(id)
            .into_iter()
            .find(|&a| self.nodes[a.0].kind.is_compute())
    }

    /// Compute construct governing `node`. The loop half of a fused
    /// annotation belongs to the compute construct on its own line.
    pub fn enclosing_compute(&self, node: &DirectiveNode) -> Option<NodeId> {
        if node.hybrid && !node.kind.is_compute() {
            return self.at_line(node.line);
        }
        match self.at_line(node.line) {
            Some(id) => self.compute_ancestor(id),
            None => self
                .ancestors_of_line(node.line)
                .into_iter()
                .find(|&a| self.nodes[a.0].kind.is_compute()),
        }
    }

    /// Re-check the structural invariants of the tree.
    pub fn validate(&self) -> AccResult<()> {
        let root = self.root();
        if root.kind != DirectiveKind::Root
            || root.region != Some(SourceRegion::new(0, self.line_count))
        {
            return Err(AccError::Internal("malformed root node".to_string()));
        }
        for (id, node) in self.iter().skip(1) {
            let parent_id = self
                .parent(id)
                .ok_or_else(|| AccError::Internal(format!("node {} has no parent", id)))?;
            let parent = &self.nodes[parent_id.0];
            let is_hybrid_half = node.hybrid && parent.hybrid && parent.line == node.line;
            if is_hybrid_half {
                if parent.region != node.region {
                    return Err(AccError::Internal(format!(
                        "hybrid halves at line {} disagree on their region",
                        node.line
                    )));
                }
            } else if !parent.is_root() && !parent.governs(node.line) {
                return Err(AccError::Internal(format!(
                    "line {} lies outside its parent at line {}",
                    node.line, parent.line
                )));
            }
            if node.region.is_none() && !node.hybrid && !self.children(id).is_empty() {
                return Err(AccError::Internal(format!(
                    "node at line {} has children but no region",
                    node.line
                )));
            }
            for ancestor in self.get_ancestors(id) {
                let a = &self.nodes[ancestor.0];
                let same_annotation = a.hybrid && a.line == node.line;
                if !same_annotation && !a.is_root() && !a.governs(node.line) {
                    return Err(AccError::Internal(format!(
                        "line {} escapes the region of its ancestor at line {}",
                        node.line, a.line
                    )));
                }
            }
        }
        for (&line, &id) in &self.line_index {
            if self.get(id).map(|n| n.line) != Some(line) {
                return Err(AccError::Internal(format!("stale line index entry {}", line)));
            }
        }
        Ok(())
    }

    /// A nested, serializable view of the tree.
    pub fn nested(&self) -> NestedNode<'_> {
        self.nested_from(NodeId::ROOT)
    }

    fn nested_from(&self, id: NodeId) -> NestedNode<'_> {
        NestedNode {
            node: &self.nodes[id.0],
            children: self.children(id).iter().map(|&c| self.nested_from(c)).collect(),
        }
    }

    fn node_doc<'a, D: DocAllocator<'a>>(&self, id: NodeId, allocator: &'a D) -> DocBuilder<'a, D> {
        let mut doc = allocator.text(self.nodes[id.0].to_string());
        for &child in self.children(id) {
            doc = doc.append(
                allocator
                    .hardline()
                    .append(self.node_doc(child, allocator))
                    .nest(2),
            );
        }
        doc
    }
}

impl Index<NodeId> for DirectiveTree {
    type Output = DirectiveNode;

    fn index(&self, id: NodeId) -> &DirectiveNode {
        &self.nodes[id.0]
    }
}

impl PrettyPrint for DirectiveTree {
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        self.node_doc(NodeId::ROOT, allocator)
    }
}

/// Borrowed nested view of a tree node, for JSON output.
#[derive(Debug, Serialize)]
pub struct NestedNode<'t> {
    #[serde(flatten)]
    pub node: &'t DirectiveNode,
    pub children: Vec<NestedNode<'t>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: DirectiveKind, line: usize, region: Option<(usize, usize)>) -> DirectiveNode {
        DirectiveNode::new(kind, line).with_region(region.map(|(s, e)| SourceRegion::new(s, e)))
    }

    #[test]
    fn test_parent_is_nearest_governing_compute() {
        let mut tree = DirectiveTree::new(20);
        let par = tree.add(node(DirectiveKind::Parallel, 1, Some((2, 12)))).unwrap();
        let data = tree.add(node(DirectiveKind::Data, 2, Some((3, 6)))).unwrap();
        let lp = tree.add(node(DirectiveKind::Loop, 3, Some((4, 6)))).unwrap();
        let after = tree.add(node(DirectiveKind::Wait, 14, None)).unwrap();

        // data does not admit children, so the loop skips over it
        assert_eq!(tree.parent(data), Some(par));
        assert_eq!(tree.parent(lp), Some(par));
        assert_eq!(tree.parent(after), Some(NodeId::ROOT));
        assert_eq!(tree.get_ancestors(lp), vec![par, NodeId::ROOT]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_ancestors_before_insertion() {
        let mut tree = DirectiveTree::new(10);
        let k = tree.add(node(DirectiveKind::Kernels, 0, Some((1, 8)))).unwrap();
        assert_eq!(tree.ancestors_of_line(2), vec![k, NodeId::ROOT]);
        assert_eq!(tree.ancestors_of_line(9), vec![NodeId::ROOT]);
    }

    #[test]
    fn test_duplicate_line_is_internal_error() {
        let mut tree = DirectiveTree::new(10);
        tree.add(node(DirectiveKind::Wait, 3, None)).unwrap();
        let err = tree.add(node(DirectiveKind::Update, 3, None)).unwrap_err();
        assert!(matches!(err, AccError::Internal(_)));
        assert!(matches!(
            tree.add(node(DirectiveKind::Wait, 10, None)),
            Err(AccError::Internal(_))
        ));
    }

    #[test]
    fn test_hybrid_and_breadth_first() {
        let mut tree = DirectiveTree::new(10);
        let mut par = node(DirectiveKind::Parallel, 1, Some((2, 8)));
        par.hybrid = true;
        let mut lp = node(DirectiveKind::Loop, 1, Some((2, 8)));
        lp.hybrid = true;
        let p = tree.add(par).unwrap();
        let l = tree.add_hybrid(p, lp).unwrap();
        let a = tree.add(node(DirectiveKind::Atomic, 4, Some((5, 6)))).unwrap();

        assert_eq!(tree.at_line(1), Some(p));
        assert_eq!(tree.children(p), &[l, a]);
        assert_eq!(tree.breadth_first(), vec![p, l, a]);
        assert_eq!(tree.compute_ancestor(l), Some(p));
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_hybrid_requires_matching_parent() {
        let mut tree = DirectiveTree::new(10);
        let d = tree.add(node(DirectiveKind::Data, 1, Some((2, 4)))).unwrap();
        let res = tree.add_hybrid(d, node(DirectiveKind::Loop, 1, Some((2, 4))));
        assert!(matches!(res, Err(AccError::Internal(_))));
    }

    #[test]
    fn test_pretty_print() {
        let mut tree = DirectiveTree::new(6);
        tree.add(node(DirectiveKind::Parallel, 0, Some((1, 5)))).unwrap();
        tree.add(node(DirectiveKind::Loop, 1, Some((2, 4)))).unwrap();
        let out = tree.pretty();
        assert_eq!(out, "root @0 [0, 6)\n  parallel @0 [1, 5)\n    loop @1 [2, 4)");
    }
}

//! Code generation from the directive tree.
//!
//! Dispatch walks the finished tree breadth-first from the root's
//! children, so every construct is generated before anything nested in
//! it. Each node goes to its backend's generator for that directive kind;
//! generators accumulate imports, kernels and body rewrites into one
//! [`CompilationTarget`], which the backend then finalizes into source.

pub mod host;
pub mod target;

pub use host::HostBackend;
pub use target::{CompilationTarget, RewrittenBody, DEFAULT_ENTRY};

use crate::ir::context::FunctionContext;
use crate::ir::directive::DirectiveKind;
use crate::ir::node::DirectiveNode;
use crate::ir::tree::DirectiveTree;
use crate::utils::errors::{AccResult, NotImplementedError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A code generator for one kind of directive.
pub type Generator =
    Box<dyn Fn(&DirectiveNode, &mut CompilationTarget, &DirectiveTree) -> AccResult<()>>;

/// A swappable code generator.
pub trait Backend {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Generate code for one node into `target`.
    fn generate(
        &self,
        node: &DirectiveNode,
        target: &mut CompilationTarget,
        tree: &DirectiveTree,
    ) -> AccResult<()>;

    /// Serialize the finished target into one source unit.
    fn finalize(&self, target: &CompilationTarget, context: &FunctionContext) -> AccResult<String> {
        Ok(target.finalize(context))
    }
}

/// A backend assembled from per-kind generators.
///
/// Kinds without a generator fail with [`NotImplementedError`].
pub struct Registry {
    name: String,
    generators: HashMap<DirectiveKind, Generator>,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), generators: HashMap::new() }
    }

    /// Register `generator` for `kind`, replacing any earlier one.
    pub fn register<F>(&mut self, kind: DirectiveKind, generator: F) -> &mut Self
    where
        F: Fn(&DirectiveNode, &mut CompilationTarget, &DirectiveTree) -> AccResult<()> + 'static,
    {
        self.generators.insert(kind, Box::new(generator));
        self
    }

    pub fn with<F>(mut self, kind: DirectiveKind, generator: F) -> Self
    where
        F: Fn(&DirectiveNode, &mut CompilationTarget, &DirectiveTree) -> AccResult<()> + 'static,
    {
        self.register(kind, generator);
        self
    }

    pub fn handles(&self, kind: DirectiveKind) -> bool {
        self.generators.contains_key(&kind)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.generators.keys().map(|k| k.keyword()).collect();
        kinds.sort_unstable();
        f.debug_struct("Registry").field("name", &self.name).field("kinds", &kinds).finish()
    }
}

impl Backend for Registry {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        node: &DirectiveNode,
        target: &mut CompilationTarget,
        tree: &DirectiveTree,
    ) -> AccResult<()> {
        match self.generators.get(&node.kind) {
            Some(generator) => generator(node, target, tree),
            None => Err(NotImplementedError {
                kind: node.kind,
                line: node.line,
                backend: self.name.clone(),
            }
            .into()),
        }
    }
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Thread pool on the host
    #[default]
    Host,
}

impl BackendKind {
    /// Instantiate the backend.
    pub fn create(self, default_gangs: usize) -> Box<dyn Backend> {
        match self {
            BackendKind::Host => Box::new(HostBackend::new(default_gangs)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Host => f.write_str("host"),
        }
    }
}

/// Dispatch every node of `tree` to `backend`, breadth-first.
pub fn compile(
    tree: &DirectiveTree,
    backend: &dyn Backend,
    mut target: CompilationTarget,
) -> AccResult<CompilationTarget> {
    for id in tree.breadth_first() {
        let node = &tree[id];
        debug!("{}: generating {} for {}", backend.name(), id, node);
        backend.generate(node, &mut target, tree)?;
    }
    Ok(target)
}

/// Compile `tree` for the function in `context` and finalize the result.
pub fn emit(
    tree: &DirectiveTree,
    backend: &dyn Backend,
    context: &FunctionContext,
    target: CompilationTarget,
) -> AccResult<String> {
    let target = compile(tree, backend, target)?;
    backend.finalize(&target, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;
    use crate::utils::errors::AccError;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SRC: &str = "\
def f(a):
    # acc parallel
    for i in range(4):
        # acc loop
        for j in range(4):
            a[i] += j
    # acc wait
    return a";

    #[test]
    fn test_unregistered_kind_is_fatal() {
        let tree = parse(SRC).unwrap();
        let ctx = FunctionContext::from_function(SRC).unwrap();
        let backend = Registry::new("partial").with(DirectiveKind::Parallel, |_, _, _| Ok(()));
        let err = compile(&tree, &backend, CompilationTarget::new(&ctx, 8)).unwrap_err();
        match err {
            AccError::NotImplemented(e) => {
                assert_eq!(e.kind, DirectiveKind::Wait);
                assert_eq!(e.line, 6);
                assert_eq!(e.backend, "partial");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_dispatch_is_breadth_first() {
        let tree = parse(SRC).unwrap();
        let ctx = FunctionContext::from_function(SRC).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut backend = Registry::new("recording");
        for kind in [DirectiveKind::Parallel, DirectiveKind::Loop, DirectiveKind::Wait] {
            let seen = Rc::clone(&seen);
            backend.register(kind, move |node, target, _| {
                seen.borrow_mut().push((node.kind, node.line));
                target.add_import("recorded");
                Ok(())
            });
        }
        let target = compile(&tree, &backend, CompilationTarget::new(&ctx, 8)).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![(DirectiveKind::Parallel, 1), (DirectiveKind::Wait, 6), (DirectiveKind::Loop, 3)]
        );
        assert_eq!(target.imports(), ["recorded".to_string()]);
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::default().to_string(), "host");
        assert_eq!(BackendKind::Host.create(2).name(), "host");
    }
}

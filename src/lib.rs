//! # pyacc - Directive-Driven Source-to-Source Compiler
//!
//! pyacc reads the source of one indentation-scoped function annotated with
//! accelerator pragmas, builds a validated tree of directives mirroring
//! their lexical nesting, and hands the tree to a backend that emits a new
//! unit of source implementing the requested parallelism:
//! - Annotation scanning (`# acc <directive> <clauses>`)
//! - Per-directive clause validation, including ancestor constraints
//! - Region inference from indentation or explicit `#{` / `#}` blocks
//! - Tree building from line positions alone
//! - Breadth-first backend dispatch (a host thread-pool backend is built in)
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → Clause Grammar + Region Extractor → Tree Builder → Dispatch → Output
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use pyacc::prelude::*;
//!
//! let source = r#"
//! def square(ls):
//!     # acc parallel loop
//!     for x in ls:
//!         ls[x] = x * x
//!     return ls
//! "#;
//!
//! let tree = pyacc::parse(source)?;
//! let context = FunctionContext::from_function(source)?;
//! let code = pyacc::compile(&context, &CompileConfig::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod frontend;
pub mod ir;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::codegen::{Backend, BackendKind, CompilationTarget, HostBackend, Registry};
    pub use crate::frontend::{BlockMarkers, DirectiveParser, Scanner};
    pub use crate::ir::*;
    pub use crate::utils::errors::*;
    pub use crate::utils::pretty::PrettyPrint;
    pub use crate::utils::source::SourceText;
    pub use crate::CompileConfig;
}

use anyhow::{Context, Result};
use codegen::{BackendKind, CompilationTarget};
use frontend::BlockMarkers;
use ir::{DirectiveTree, FunctionContext};
use serde::{Deserialize, Serialize};
use utils::source::SourceText;

/// Configuration for the compilation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Keyword after the comment marker that introduces an annotation
    pub framework: String,
    /// Text after `#` on a line that opens an explicit block
    pub block_open: String,
    /// Text after `#` on a line that closes an explicit block
    pub block_close: String,
    /// Tab stop used when measuring indentation
    pub tab_width: usize,
    /// Name of the generated entry point
    pub entry: String,
    /// Host pool size when no literal gang count is given
    pub default_gangs: usize,
    /// Code generation backend
    pub backend: BackendKind,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            framework: frontend::scanner::DEFAULT_FRAMEWORK.to_string(),
            block_open: "{".to_string(),
            block_close: "}".to_string(),
            tab_width: utils::source::DEFAULT_TAB_WIDTH,
            entry: codegen::DEFAULT_ENTRY.to_string(),
            default_gangs: codegen::host::DEFAULT_GANGS,
            backend: BackendKind::Host,
        }
    }
}

impl CompileConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid configuration")
    }

    /// Set the framework keyword.
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Set the explicit block markers.
    pub fn with_block_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.block_open = open.into();
        self.block_close = close.into();
        self
    }

    /// Set the tab width.
    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = tab_width;
        self
    }

    /// Set the entry point name.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Set the default gang count.
    pub fn with_default_gangs(mut self, gangs: usize) -> Self {
        self.default_gangs = gangs;
        self
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// The explicit block markers as the region extractor expects them.
    pub fn block_markers(&self) -> BlockMarkers {
        BlockMarkers {
            open: self.block_open.clone(),
            close: self.block_close.clone(),
        }
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse the annotations of `source` with the default configuration.
pub fn parse(source: &str) -> Result<DirectiveTree> {
    parse_with(source, &CompileConfig::default())
}

/// Parse the annotations of `source`.
pub fn parse_with(source: &str, config: &CompileConfig) -> Result<DirectiveTree> {
    let text = SourceText::with_tab_width(source, config.tab_width);
    let tree = frontend::parse_source(&text, config).context("failed to parse directives")?;
    Ok(tree)
}

/// Full pipeline: parse the function in `context` and generate code for it.
pub fn compile(context: &FunctionContext, config: &CompileConfig) -> Result<String> {
    let tree = parse_with(&context.source, config)?;
    let backend = config.backend.create(config.default_gangs);
    let target = CompilationTarget::new(context, config.tab_width).with_entry(config.entry.as_str());
    let code = codegen::emit(&tree, backend.as_ref(), context, target)
        .with_context(|| format!("{} backend failed", backend.name()))?;
    Ok(code)
}

/// Compile a single function given as source text, with no auxiliary context.
pub fn compile_function(source: &str, config: &CompileConfig) -> Result<String> {
    let context = FunctionContext::from_function(source).context("failed to read function signature")?;
    compile(&context, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = CompileConfig::default();
        assert_eq!(config.framework, "acc");
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.entry, "execute");
        assert_eq!(config.default_gangs, 4);
        assert_eq!(config.block_markers(), BlockMarkers::default());
    }

    #[test]
    fn test_partial_json_config() {
        let config = CompileConfig::from_json(r#"{"framework": "omp", "default_gangs": 8}"#).unwrap();
        assert_eq!(config.framework, "omp");
        assert_eq!(config.default_gangs, 8);
        assert_eq!(config.entry, "execute");
        assert_eq!(config.backend, BackendKind::Host);
        assert!(CompileConfig::from_json("{\"tab_width\": \"wide\"}").is_err());
    }

    #[test]
    fn test_custom_framework_and_markers() {
        let config = CompileConfig::default()
            .with_framework("omp")
            .with_block_markers("begin", "end");
        let src = "# omp parallel\n# begin\nx = 1\ny = 2\n# end\n# acc loop\nz = 3";
        let tree = parse_with(src, &config).unwrap();
        assert_eq!(tree.len(), 2);
        let par = &tree[tree.at_line(0).unwrap()];
        assert!(par.delimited);
        assert_eq!(par.region, Some(ir::SourceRegion::new(2, 4)));
    }

    #[test]
    fn test_compile_function_entry_name() {
        let src = "def f(a):\n    # acc parallel loop\n    for i in a:\n        g(i)\n    return a";
        let code = compile_function(src, &CompileConfig::default().with_entry("run")).unwrap();
        assert!(code.contains("def run(a):\n"));
        assert!(code.contains("def _acc_kernel_1(_acc_index):\n    i = _acc_index\n    g(i)\n"));
    }
}

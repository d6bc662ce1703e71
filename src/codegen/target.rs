//! The compilation target a backend fills in during dispatch.

use crate::ir::context::FunctionContext;
use crate::ir::icv::Icvs;
use crate::ir::node::SourceRegion;
use crate::utils::errors::{AccResult, CodegenError, CodegenErrorKind};
use crate::utils::pretty::{dedent_lines, CodeFormatter};
use crate::utils::source::SourceText;
use std::collections::BTreeMap;

/// Default name of the generated entry point.
pub const DEFAULT_ENTRY: &str = "execute";

/// Lines `[start, end)` of the original function replaced by new text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    end: usize,
    lines: Vec<String>,
}

/// The original function body plus non-overlapping line-range rewrites.
#[derive(Debug, Clone)]
pub struct RewrittenBody {
    /// Function-relative line of the first body line
    start: usize,
    end: usize,
    replacements: BTreeMap<usize, Replacement>,
}

impl RewrittenBody {
    fn new(start: usize, end: usize) -> Self {
        Self { start, end, replacements: BTreeMap::new() }
    }

    /// Lines covered by the body.
    pub fn lines(&self) -> SourceRegion {
        SourceRegion::new(self.start, self.end)
    }

    /// The rewrite covering `line`, if any.
    pub fn covering(&self, line: usize) -> Option<SourceRegion> {
        self.replacements
            .range(..=line)
            .next_back()
            .filter(|(_, r)| line < r.end)
            .map(|(&start, r)| SourceRegion::new(start, r.end))
    }

    pub fn is_rewritten(&self, line: usize) -> bool {
        self.covering(line).is_some()
    }

    /// Replace `range` with `lines`. Fails if the range leaves the body or
    /// overlaps an earlier rewrite.
    pub fn replace(&mut self, range: SourceRegion, lines: Vec<String>) -> AccResult<()> {
        let outside = range.start_line < self.start || range.end_line > self.end;
        let overlapping = self
            .replacements
            .iter()
            .any(|(&start, r)| range.overlaps(&SourceRegion::new(start, r.end)));
        if outside || overlapping || range.is_empty() {
            return Err(CodegenError::new(
                CodegenErrorKind::OverlappingRewrite,
                range.start_line,
                format!("cannot rewrite lines {} of body {}", range, self.lines()),
            )
            .into());
        }
        self.replacements.insert(range.start_line, Replacement { end: range.end_line, lines });
        Ok(())
    }

    /// The body with every rewrite applied.
    pub fn render(&self, source: &SourceText) -> Vec<String> {
        let mut out = Vec::new();
        let mut line = self.start;
        while line < self.end {
            if let Some(r) = self.replacements.get(&line) {
                out.extend(r.lines.iter().cloned());
                line = r.end;
            } else {
                out.push(source.line(line).unwrap_or("").to_string());
                line += 1;
            }
        }
        out
    }
}

/// Everything a backend produces for one function.
///
/// Built incrementally during dispatch and serialized by
/// [`CompilationTarget::finalize`].
#[derive(Debug, Clone)]
pub struct CompilationTarget {
    source: SourceText,
    entry: String,
    parameters: Vec<String>,
    imports: Vec<String>,
    helpers: Vec<String>,
    kernels: Vec<String>,
    body: RewrittenBody,
    icvs: Icvs,
}

impl CompilationTarget {
    /// A target over the function in `context`.
    pub fn new(context: &FunctionContext, tab_width: usize) -> Self {
        let source = SourceText::with_tab_width(&context.source, tab_width);
        let body = RewrittenBody::new(context.body_start().min(source.len()), source.len());
        Self {
            source,
            entry: DEFAULT_ENTRY.to_string(),
            parameters: context.parameter_names().into_iter().map(str::to_string).collect(),
            imports: Vec::new(),
            helpers: Vec::new(),
            kernels: Vec::new(),
            body,
            icvs: Icvs::default(),
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// The original function source.
    pub fn source(&self) -> &SourceText {
        &self.source
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Parameter names of the function, without annotations or stars.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Add a module import; returns false if it was already present.
    pub fn add_import(&mut self, module: &str) -> bool {
        push_unique(&mut self.imports, module)
    }

    /// Add a module-level helper statement, once.
    pub fn add_helper(&mut self, helper: &str) -> bool {
        push_unique(&mut self.helpers, helper)
    }

    /// Append a generated auxiliary function.
    pub fn add_kernel(&mut self, kernel: String) {
        self.kernels.push(kernel);
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn helpers(&self) -> &[String] {
        &self.helpers
    }

    pub fn kernels(&self) -> &[String] {
        &self.kernels
    }

    pub fn body(&self) -> &RewrittenBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RewrittenBody {
        &mut self.body
    }

    /// Internal control variables as of the directives generated so far.
    pub fn icvs(&self) -> &Icvs {
        &self.icvs
    }

    pub fn icvs_mut(&mut self) -> &mut Icvs {
        &mut self.icvs
    }

    /// Serialize into one source unit: imports, module aliases, helpers,
    /// auxiliary functions, kernels, then the entry point.
    pub fn finalize(&self, context: &FunctionContext) -> String {
        let mut out = CodeFormatter::default_indent();
        for module in &self.imports {
            out.writeln(&format!("import {}", module));
        }
        let mut aliases = Vec::new();
        for alias in context.callee_modules.iter().chain(&context.caller_modules) {
            push_unique(&mut aliases, &alias.import_statement());
        }
        for statement in &aliases {
            out.writeln(statement);
        }

        let sections = self
            .helpers
            .iter()
            .chain(&context.callee_functions)
            .chain(&context.caller_functions)
            .chain(&self.kernels);
        let mut wrote_header = !self.imports.is_empty() || !aliases.is_empty();
        for section in sections {
            if wrote_header {
                out.newline();
            }
            out.write_block(&dedent_lines(&section.lines().collect::<Vec<_>>()).join("\n"));
            wrote_header = true;
        }
        if wrote_header {
            out.newline();
        }

        let params = context.parameters.join(", ");
        let body = dedent_lines(&self.body.render(&self.source));
        out.block(&format!("def {}({})", self.entry, params), |f| {
            f.write_block(&body.join("\n"));
            if body.iter().all(|l| is_trivia(l)) {
                f.writeln("pass");
            }
        });
        out.finish()
    }
}

/// Blank or comment-only: nothing for the interpreter to execute.
fn is_trivia(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('#')
}

fn push_unique(items: &mut Vec<String>, item: &str) -> bool {
    if items.iter().any(|i| i == item) {
        return false;
    }
    items.push(item.to_string());
    true
}

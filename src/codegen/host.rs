//! Thread-pool backend for the host.
//!
//! A parallelized loop has its body moved into a kernel function that is
//! mapped over the loop's iteration space by a `concurrent.futures` pool.
//! Reductions run into a private copy per iteration and are folded with
//! `functools.reduce` after the pool drains. Data movement, synchronization
//! and device management have nothing to do on the host.

use super::target::CompilationTarget;
use super::Backend;
use crate::frontend::nest::{parse_for_header, ForHeader};
use crate::frontend::region::statement_extent;
use crate::ir::clause::{ClauseKind, IntExpr, ReductionOp};
use crate::ir::directive::DirectiveKind;
use crate::ir::node::{DirectiveNode, SourceRegion};
use crate::ir::tree::DirectiveTree;
use crate::utils::errors::{AccError, AccResult, CodegenError, CodegenErrorKind};
use crate::utils::idents::{assigned_names, identifiers, is_identifier, referenced_variables};
use crate::utils::pretty::{dedent_lines, CodeFormatter};
use crate::utils::source::SourceText;
use log::{debug, info, trace, warn};
use std::collections::BTreeSet;

/// Pool size when no literal gang count is given.
pub const DEFAULT_GANGS: usize = 4;

const LOCK: &str = "_acc_lock";
const INDEX: &str = "_acc_index";
const POOL: &str = "_acc_pool";

/// Runs compute constructs on a host thread pool.
#[derive(Debug, Clone)]
pub struct HostBackend {
    default_gangs: usize,
}

impl HostBackend {
    pub fn new(default_gangs: usize) -> Self {
        Self { default_gangs: default_gangs.max(1) }
    }

    pub fn default_gangs(&self) -> usize {
        self.default_gangs
    }

    /// Pool size for a loop: an explicit `gang(num)` literal, else a
    /// literal `num_gangs` on the compute construct, else the default.
    fn gang_count(&self, node: &DirectiveNode, compute: &DirectiveNode) -> usize {
        node.clauses
            .gang()
            .and_then(|g| g.num.as_ref())
            .and_then(IntExpr::literal)
            .or_else(|| compute.clauses.int(ClauseKind::NumGangs).and_then(IntExpr::literal))
            .map_or(self.default_gangs, |n| n as usize)
            .max(1)
    }

    fn generate_loop(
        &self,
        node: &DirectiveNode,
        target: &mut CompilationTarget,
        tree: &DirectiveTree,
    ) -> AccResult<()> {
        let region = node
            .region
            .ok_or_else(|| shape(node.line, "`loop` governs no statement"))?;
        if target.body().is_rewritten(region.start_line) {
            debug!("line {}: loop runs sequentially inside an enclosing kernel", node.line);
            return Ok(());
        }
        let compute = match tree.enclosing_compute(node).map(|id| &tree[id]) {
            Some(c) if c.kind != DirectiveKind::Serial => c,
            _ => {
                debug!("line {}: loop outside a parallel construct runs sequentially", node.line);
                return Ok(());
            }
        };
        if node.clauses.contains(ClauseKind::Seq) {
            debug!("line {}: `seq` loop runs sequentially", node.line);
            return Ok(());
        }

        let gangs = self.gang_count(node, compute);
        let source = target.source();
        let nest = LoopNest::collect(source, node, region)?;
        let reductions = reduction_vars(node)?;
        let atomics: Vec<SourceRegion> = tree
            .iter()
            .filter(|(_, n)| n.kind == DirectiveKind::Atomic && nest.body.contains(n.line))
            .filter_map(|(_, n)| n.region)
            .collect();

        let returned = returned_value(&reductions);
        let body = dedent_lines(&wrap_atomics(source, nest.body, &atomics));
        let body = translate_control(&body, &returned, node.line)?;

        let targets: BTreeSet<String> =
            nest.headers.iter().flat_map(|h| identifiers(&h.target)).collect();
        let reduced: BTreeSet<&str> = reductions.iter().map(|(_, v)| v.as_str()).collect();
        let mut visible: BTreeSet<String> = target.parameters().iter().cloned().collect();
        visible.extend(assigned_names(
            &source.text(target.body().lines().start_line..nest.start),
        ));
        let captured: Vec<String> = referenced_variables(&body.join("\n"))
            .into_iter()
            .filter(|v| visible.contains(v) && !targets.contains(v) && !reduced.contains(v.as_str()))
            .collect();

        let name = format!("_acc_kernel_{}", node.line);
        let mut params: Vec<&str> = captured.iter().map(String::as_str).collect();
        params.push(INDEX);
        let mut kernel = CodeFormatter::default_indent();
        kernel.block(&format!("def {}({})", name, params.join(", ")), |f| {
            f.writeln(&format!("{} = {}", unpack_targets(&nest.headers), INDEX));
            for (op, var) in &reductions {
                f.writeln(&format!("{} = {}", var, identity(*op)));
            }
            f.write_block(&body.join("\n"));
            if !returned.is_empty() {
                f.writeln(&format!("return{}", returned));
            }
        });

        let (space, product) = iteration_space(&nest.headers);
        let callable = if captured.is_empty() {
            name.clone()
        } else {
            format!("functools.partial({}, {})", name, captured.join(", "))
        };
        let map = format!("{}.map({}, {})", POOL, callable, space);
        let indent = leading(source.line(nest.start).unwrap_or("")).to_string();
        let mut launch = vec![format!(
            "{}with concurrent.futures.ThreadPoolExecutor(max_workers={}) as {}:",
            indent, gangs, POOL
        )];
        if reductions.is_empty() {
            launch.push(format!("{}    list({})", indent, map));
        } else {
            let results = format!("_acc_results_{}", node.line);
            launch.push(format!("{}    {} = list({})", indent, results, map));
            for (k, (op, var)) in reductions.iter().enumerate() {
                let values = if reductions.len() == 1 {
                    results.clone()
                } else {
                    format!("(r[{}] for r in {})", k, results)
                };
                launch.push(format!(
                    "{}{} = functools.reduce({}, {}, {})",
                    indent,
                    var,
                    fold(*op),
                    values,
                    var
                ));
            }
        }

        let mut imports = vec!["concurrent.futures"];
        if !captured.is_empty() || !reductions.is_empty() {
            imports.push("functools");
        }
        if product {
            imports.push("itertools");
        }
        if reductions.iter().any(|(op, _)| fold(*op).starts_with("operator.")) {
            imports.push("operator");
        }
        let span = SourceRegion::new(nest.start, nest.end);

        for module in imports {
            target.add_import(module);
        }
        if !atomics.is_empty() {
            add_lock(target);
        }
        target.add_kernel(kernel.finish());
        target.body_mut().replace(span, launch)?;
        info!(
            "line {}: {}-deep loop nest moved into `{}` on {} gangs",
            node.line,
            nest.headers.len(),
            name,
            gangs
        );
        Ok(())
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new(DEFAULT_GANGS)
    }
}

impl Backend for HostBackend {
    fn name(&self) -> &str {
        "host"
    }

    fn generate(
        &self,
        node: &DirectiveNode,
        target: &mut CompilationTarget,
        tree: &DirectiveTree,
    ) -> AccResult<()> {
        match node.kind {
            DirectiveKind::Root | DirectiveKind::Serial => Ok(()),
            DirectiveKind::Parallel | DirectiveKind::Kernels => {
                target.add_import("concurrent.futures");
                Ok(())
            }
            DirectiveKind::Loop => self.generate_loop(node, target, tree),
            DirectiveKind::Atomic => generate_atomic(node, target),
            DirectiveKind::Set => {
                if target.icvs_mut().apply_set(&node.clauses) {
                    debug!("line {}: {}", node.line, target.icvs());
                }
                if !target.icvs().targets_host() {
                    warn!(
                        "line {}: device type `{}` runs on the host pool",
                        node.line,
                        target.icvs().device_type
                    );
                }
                Ok(())
            }
            DirectiveKind::Data
            | DirectiveKind::HostData
            | DirectiveKind::Cache
            | DirectiveKind::Declare
            | DirectiveKind::Routine
            | DirectiveKind::Update
            | DirectiveKind::Wait
            | DirectiveKind::Init
            | DirectiveKind::Shutdown
            | DirectiveKind::EnterData
            | DirectiveKind::ExitData => {
                trace!("line {}: `{}` is a no-op on the host", node.line, node.kind);
                Ok(())
            }
        }
    }
}

/// The `for` statements a loop directive parallelizes.
#[derive(Debug)]
struct LoopNest {
    /// Outermost first
    headers: Vec<ForHeader>,
    /// First line of the outermost `for`
    start: usize,
    /// Exclusive end of the outermost loop
    end: usize,
    /// Body of the innermost loop
    body: SourceRegion,
}

impl LoopNest {
    fn collect(source: &SourceText, node: &DirectiveNode, region: SourceRegion) -> AccResult<Self> {
        let associated = node
            .clauses
            .collapse()
            .map(|c| &c.associated_loops)
            .or_else(|| node.clauses.tile().map(|t| &t.associated_loops))
            .filter(|loops| !loops.is_empty());
        let (headers, lines): (Vec<ForHeader>, Vec<usize>) = match associated {
            Some(loops) => loops
                .iter()
                .map(|l| {
                    let header = ForHeader { target: l.target.clone(), iterable: l.iterable.clone() };
                    (header, l.line)
                })
                .unzip(),
            None => {
                let line = source
                    .next_statement(region.start_line)
                    .filter(|&l| l < region.end_line)
                    .ok_or_else(|| shape(node.line, "`loop` governs no statement"))?;
                let header = parse_for_header(&source.text(line..source.statement_end(line) + 1))
                    .ok_or_else(|| shape(line, "`loop` must govern a `for` statement"))?;
                (vec![header], vec![line])
            }
        };
        let (Some(&start), Some(&innermost)) = (lines.first(), lines.last()) else {
            return Err(AccError::Internal(format!("empty loop nest at line {}", node.line)));
        };

        let header_end = source.statement_end(innermost);
        let depth = source.indent(innermost).unwrap_or(0);
        let inner_end = statement_extent(source, innermost);
        if header_end + 1 >= inner_end {
            return Err(shape(innermost, "loop body must start on its own line"));
        }
        let trailing = (header_end + 1..inner_end)
            .find(|&l| source.info(l).map_or(false, |i| i.starts_statement() && i.indent <= depth));
        if let Some(l) = trailing {
            return Err(shape(l, "a `for` loop with an `else` clause cannot be parallelized"));
        }
        Ok(Self {
            headers,
            start,
            end: statement_extent(source, start),
            body: SourceRegion::new(header_end + 1, inner_end),
        })
    }
}

fn generate_atomic(node: &DirectiveNode, target: &mut CompilationTarget) -> AccResult<()> {
    let Some(region) = node.region.filter(|r| !r.is_empty()) else {
        return Err(shape(node.line, "`atomic` governs no statement"));
    };
    if target.body().is_rewritten(node.line) {
        trace!("line {}: atomic already locked inside a kernel", node.line);
        return Ok(());
    }
    let lines = locked(target.source(), region);
    add_lock(target);
    target.body_mut().replace(region, lines)
}

fn add_lock(target: &mut CompilationTarget) {
    target.add_import("threading");
    target.add_helper(&format!("{} = threading.Lock()", LOCK));
}

/// Lines of `range` with every atomic region in it wrapped in the lock.
fn wrap_atomics(source: &SourceText, range: SourceRegion, atomics: &[SourceRegion]) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = range.start_line;
    while line < range.end_line {
        match atomics.iter().find(|r| r.start_line == line && !r.is_empty()) {
            Some(region) => {
                out.extend(locked(source, *region));
                line = region.end_line;
            }
            None => {
                out.push(source.line(line).unwrap_or("").to_string());
                line += 1;
            }
        }
    }
    out
}

fn locked(source: &SourceText, region: SourceRegion) -> Vec<String> {
    let first = source
        .next_statement(region.start_line)
        .filter(|&l| l < region.end_line)
        .unwrap_or(region.start_line);
    let indent = leading(source.line(first).unwrap_or(""));
    let mut out = vec![format!("{}with {}:", indent, LOCK)];
    out.extend(source.slice(region.lines()).iter().map(|l| {
        if l.trim().is_empty() {
            String::new()
        } else {
            format!("    {}", l)
        }
    }));
    out
}

/// Rewrite loop control for a body that now runs as a function: a
/// top-level `continue` returns early, `break` and `return` are rejected.
fn translate_control(lines: &[String], returned: &str, line: usize) -> AccResult<Vec<String>> {
    // (indent, is a function or class scope)
    let mut scopes: Vec<(usize, bool)> = Vec::new();
    let mut out = Vec::with_capacity(lines.len());
    for text in lines {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push(text.clone());
            continue;
        }
        let indent = text.len() - text.trim_start().len();
        while scopes.last().map_or(false, |&(i, _)| i >= indent) {
            scopes.pop();
        }
        let margin = &text[..indent];
        if scopes.is_empty() && trimmed == "continue" {
            out.push(format!("{}return{}", margin, returned));
            continue;
        }
        if scopes.is_empty() && trimmed == "break" {
            return Err(shape(line, "`break` cannot leave a parallel loop"));
        }
        let in_function = scopes.iter().any(|&(_, f)| f);
        if !in_function && starts_with_keyword(trimmed, "return") {
            return Err(shape(line, "`return` inside a parallel loop body"));
        }
        if starts_with_keyword(trimmed, "for") || starts_with_keyword(trimmed, "while") {
            scopes.push((indent, false));
        } else if ["def", "async", "class"].iter().any(|kw| starts_with_keyword(trimmed, kw)) {
            scopes.push((indent, true));
        }
        out.push(text.clone());
    }
    Ok(out)
}

fn starts_with_keyword(statement: &str, keyword: &str) -> bool {
    statement
        .strip_prefix(keyword)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == ':'))
}

fn reduction_vars(node: &DirectiveNode) -> AccResult<Vec<(ReductionOp, String)>> {
    let mut vars = Vec::new();
    for reduction in node.clauses.reductions() {
        for var in &reduction.variables {
            if !is_identifier(var) {
                return Err(CodegenError::new(
                    CodegenErrorKind::UnsupportedFeature,
                    node.line,
                    format!("cannot reduce into `{}` on the host", var),
                )
                .into());
            }
            vars.push((reduction.operator, var.clone()));
        }
    }
    Ok(vars)
}

/// Text after `return` in a kernel: nothing, one variable, or a tuple.
fn returned_value(reductions: &[(ReductionOp, String)]) -> String {
    match reductions {
        [] => String::new(),
        [(_, var)] => format!(" {}", var),
        many => {
            let vars: Vec<&str> = many.iter().map(|(_, v)| v.as_str()).collect();
            format!(" ({})", vars.join(", "))
        }
    }
}

fn identity(op: ReductionOp) -> &'static str {
    match op {
        ReductionOp::Add | ReductionOp::BitOr | ReductionOp::BitXor => "0",
        ReductionOp::Mul => "1",
        ReductionOp::Max => "float(\"-inf\")",
        ReductionOp::Min => "float(\"inf\")",
        ReductionOp::BitAnd => "~0",
        ReductionOp::And => "True",
        ReductionOp::Or => "False",
    }
}

fn fold(op: ReductionOp) -> &'static str {
    match op {
        ReductionOp::Add => "operator.add",
        ReductionOp::Mul => "operator.mul",
        ReductionOp::Max => "max",
        ReductionOp::Min => "min",
        ReductionOp::BitAnd => "operator.and_",
        ReductionOp::BitOr => "operator.or_",
        ReductionOp::BitXor => "operator.xor",
        ReductionOp::And => "lambda x, y: x and y",
        ReductionOp::Or => "lambda x, y: x or y",
    }
}

/// The iterable a pool maps over, and whether it needs `itertools`.
///
/// Independent nests use `itertools.product`; a nest whose inner ranges
/// read outer targets becomes a generator expression.
fn iteration_space(headers: &[ForHeader]) -> (String, bool) {
    if let [single] = headers {
        return (single.iterable.clone(), false);
    }
    let dependent = headers.iter().enumerate().any(|(i, h)| {
        let used = referenced_variables(&h.iterable);
        headers[..i]
            .iter()
            .any(|outer| identifiers(&outer.target).iter().any(|t| used.contains(t)))
    });
    if dependent {
        let clauses: Vec<String> = headers
            .iter()
            .map(|h| format!("for {} in {}", h.target, h.iterable))
            .collect();
        (format!("(({}) {})", unpack_targets(headers), clauses.join(" ")), false)
    } else {
        let iterables: Vec<&str> = headers.iter().map(|h| h.iterable.as_str()).collect();
        (format!("itertools.product({})", iterables.join(", ")), true)
    }
}

fn unpack_targets(headers: &[ForHeader]) -> String {
    if let [single] = headers {
        return single.target.clone();
    }
    let patterns: Vec<String> = headers
        .iter()
        .map(|h| {
            let t = h.target.trim();
            if t.contains(',') && !t.starts_with('(') {
                format!("({})", t)
            } else {
                t.to_string()
            }
        })
        .collect();
    patterns.join(", ")
}

fn leading(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn shape(line: usize, message: &str) -> AccError {
    CodegenError::new(CodegenErrorKind::UnsupportedShape, line, message).into()
}

//! Integration tests for the directive pipeline.

use pretty_assertions::assert_eq;
use pyacc::codegen::{compile, emit, Registry};
use pyacc::prelude::*;
use pyacc::{compile_function, parse};
use std::cell::RefCell;
use std::rc::Rc;

const SQUARE: &str = r#"def square(ls):
    # acc parallel loop
    for x in ls:
        ls[x] = x * x
    return ls"#;

fn frontend_error(source: &str) -> AccError {
    pyacc::frontend::parse(source).expect_err("expected a parse error")
}

#[test]
fn test_square_tree() {
    let tree = parse(SQUARE).expect("Failed to parse");
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.line_count(), 5);

    let root = tree.root();
    assert_eq!(root.kind, DirectiveKind::Root);
    assert_eq!(root.region, Some(SourceRegion::new(0, 5)));

    let parallel = tree.children(NodeId::ROOT)[0];
    assert_eq!(tree[parallel].kind, DirectiveKind::Parallel);
    assert!(tree[parallel].hybrid);
    assert_eq!(tree[parallel].region, Some(SourceRegion::new(2, 4)));

    let lp = tree.children(parallel)[0];
    assert_eq!(tree[lp].kind, DirectiveKind::Loop);
    assert_eq!(tree[lp].region, tree[parallel].region);
    assert_eq!(tree.pretty(), "root @0 [0, 5)\n  parallel @1 [2, 4) hybrid\n    loop @1 [2, 4) hybrid");
}

#[test]
fn test_recording_backend_sees_parallel_then_loop() {
    let tree = parse(SQUARE).unwrap();
    let context = FunctionContext::from_function(SQUARE).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let mut backend = Registry::new("recording");
    for kind in [DirectiveKind::Parallel, DirectiveKind::Loop] {
        let seen = Rc::clone(&seen);
        backend.register(kind, move |node, _, _| {
            seen.borrow_mut().push(node.kind);
            Ok(())
        });
    }
    compile(&tree, &backend, CompilationTarget::new(&context, 8)).unwrap();
    assert_eq!(*seen.borrow(), vec![DirectiveKind::Parallel, DirectiveKind::Loop]);
}

#[test]
fn test_collapse_counts_loops() {
    let ok = "\
# acc parallel
#{
# acc loop collapse(2)
for i in range(4):
    for j in range(4):
        work(i, j)
#}";
    let tree = pyacc::frontend::parse(ok).unwrap();
    let lp = &tree[tree.at_line(2).unwrap()];
    let collapse = lp.clauses.collapse().unwrap();
    assert_eq!(collapse.loop_count, 2);
    let targets: Vec<&str> = collapse.associated_loops.iter().map(|l| l.target.as_str()).collect();
    assert_eq!(targets, vec!["i", "j"]);
    assert!(collapse.associated_loops[1].variables.contains("work"));

    let err = frontend_error(&ok.replace("collapse(2)", "collapse(3)"));
    assert!(matches!(err, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::LoopCountMismatch));
    assert!(err.to_string().contains("expected 3 loops, found 2"));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_worker_size_needs_kernels() {
    let parallel = "\
# acc parallel
#{
# acc loop worker(4)
for i in range(8):
    f(i)
#}";
    let err = frontend_error(parallel);
    match err {
        AccError::InvalidClause(ref e) => {
            assert_eq!(e.kind, InvalidClauseKind::AncestorConflict);
            assert_eq!(e.line, 2);
        }
        ref other => panic!("unexpected error: {}", other),
    }

    let kernels = parallel.replace("# acc parallel", "# acc kernels");
    let tree = pyacc::frontend::parse(&kernels).unwrap();
    let lp = &tree[tree.at_line(2).unwrap()];
    assert_eq!(lp.clauses.worker().unwrap().count, Some(4));
}

#[test]
fn test_unknown_clause_reports_line_and_alternatives() {
    let source = "\
def f(a):
    x = 0
    # acc loop bogus_clause
    for i in a:
        x += i
    return x";
    let err = frontend_error(source);
    assert_eq!(err.line(), Some(2));
    match err {
        AccError::InvalidClause(ref e) => {
            assert_eq!(e.kind, InvalidClauseKind::Unrecognized);
            assert_eq!(e.clause, "bogus_clause");
            assert!(e.expected.iter().any(|c| c == "collapse"));
        }
        ref other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_syntax_errors() {
    let unknown = frontend_error("# acc teleport\nx = 1");
    assert!(matches!(unknown, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::UnknownDirective));

    let unclosed = frontend_error("x = 0\n# acc data copy(a)\n#{\nx = 1");
    assert!(matches!(unclosed, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::UnterminatedBlock));
    assert_eq!(unclosed.line(), Some(1));

    let parens = frontend_error("# acc parallel num_gangs(4\nx = 1");
    assert!(matches!(parens, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::UnbalancedParens));

    let dangling = frontend_error("x = 1\n# acc loop");
    assert!(matches!(dangling, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::MissingStatement));
}

#[test]
fn test_repeated_and_conflicting_clauses() {
    let dup = frontend_error("# acc parallel num_gangs(2) num_gangs(4)\nx = 1");
    assert!(matches!(dup, AccError::InvalidClause(ref e) if e.kind == InvalidClauseKind::Duplicate));

    let tree = pyacc::frontend::parse("# acc parallel copy(a) copy(b)\nx = 1").unwrap();
    let par = &tree[tree.at_line(0).unwrap()];
    assert_eq!(par.clauses.vars(ClauseKind::Copy).unwrap().vars, vec!["a", "b"]);

    let conflict = frontend_error("# acc loop seq independent\nfor i in a:\n    f(i)");
    assert!(matches!(conflict, AccError::InvalidClause(ref e) if e.kind == InvalidClauseKind::Conflicting));

    let missing = frontend_error("# acc update async\n");
    assert!(matches!(missing, AccError::InvalidClause(ref e) if e.kind == InvalidClauseKind::Missing));
}

#[test]
fn test_sibling_constructs_and_data_regions() {
    let source = "\
def f(a, b):
    # acc data copyin(a) copyout(b)
    #{
    # acc parallel loop
    for i in range(4):
        b[i] = a[i]
    # acc kernels loop
    for j in range(4):
        b[j] += 1
    #}
    return b";
    let tree = parse(source).unwrap();
    let data = tree.at_line(1).unwrap();
    let first = tree.at_line(3).unwrap();
    let second = tree.at_line(6).unwrap();
    assert_eq!(tree[data].region, Some(SourceRegion::new(3, 9)));
    // data regions do not adopt compute constructs
    assert_eq!(tree.parent(first), Some(NodeId::ROOT));
    assert_eq!(tree.parent(second), Some(NodeId::ROOT));
    assert_eq!(tree[first].region, Some(SourceRegion::new(4, 6)));
    assert_eq!(tree[second].region, Some(SourceRegion::new(7, 9)));
    assert!(tree.validate().is_ok());
}

#[test]
fn test_json_view() {
    let tree = parse(SQUARE).unwrap();
    let json = serde_json::to_value(tree.nested()).unwrap();
    assert_eq!(json["kind"], "Root");
    assert_eq!(json["children"][0]["kind"], "Parallel");
    assert_eq!(json["children"][0]["line"], 1);
    assert_eq!(json["children"][0]["children"][0]["kind"], "Loop");
}

#[test]
fn test_host_code_with_context() {
    let context = FunctionContext::from_function(SQUARE)
        .unwrap()
        .with_callee_functions(vec!["def unused():\n    return 0".to_string()])
        .with_caller_modules(vec![ModuleAlias::new("np", "numpy")]);
    let code = pyacc::compile(&context, &CompileConfig::default().with_default_gangs(2)).unwrap();
    let expected = "\
import concurrent.futures
import functools
import numpy as np

def unused():
    return 0

def _acc_kernel_1(ls, _acc_index):
    x = _acc_index
    ls[x] = x * x

def execute(ls):
    # acc parallel loop
    with concurrent.futures.ThreadPoolExecutor(max_workers=2) as _acc_pool:
        list(_acc_pool.map(functools.partial(_acc_kernel_1, ls), ls))
    return ls
";
    assert_eq!(code, expected);
}

#[test]
fn test_host_backend_through_emit() {
    let source = "\
def norm(v):
    best = 0
    # acc kernels loop reduction(max: best) gang(num: 3)
    for x in v:
        best = max(best, abs(x))
    return best";
    let tree = parse(source).unwrap();
    let context = FunctionContext::from_function(source).unwrap();
    let code = emit(&tree, &HostBackend::new(8), &context, CompilationTarget::new(&context, 8)).unwrap();
    assert!(code.contains("ThreadPoolExecutor(max_workers=3)"));
    assert!(code.contains("    best = float(\"-inf\")\n"));
    assert!(code.contains("    best = functools.reduce(max, _acc_results_2, best)\n"));
    assert!(!code.contains("import operator"));
}

#[test]
fn test_compile_function_propagates_context() {
    let err = compile_function("# acc loop\nfor i in a:\n    f(i)", &CompileConfig::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("no function definition"));

    let err = compile_function("def f(a):\n    # acc loop gang(4)\n    for i in a:\n        f(i)", &CompileConfig::default())
        .unwrap_err();
    assert!(format!("{:#}", err).contains("failed to parse directives"));
}

#[test]
fn test_collapse_needs_exact_nest_depth() {
    let deeper = "# acc loop collapse(1)\nfor i in range(3):\n    for j in range(4):\n        work(i, j)";
    let err = frontend_error(deeper);
    assert!(matches!(err, AccError::Syntax(ref e) if e.kind == SyntaxErrorKind::LoopCountMismatch));
    assert!(err.to_string().contains("expected 1 loops, found 2"));

    let huge = frontend_error(&deeper.replace("collapse(1)", "collapse(4000000000)"));
    assert!(huge.to_string().contains("expected 4000000000 loops, found 2"));
}

#[test]
fn test_collapse_ignores_trailing_comment() {
    let source = "\
def f(a):
    # acc parallel loop collapse(2)
    for i in range(3):
        for j in range(4):
            a[i][j] = 0
        # done with row
    return a";
    let tree = parse(source).unwrap();
    let par = tree.at_line(1).unwrap();
    let lp = &tree[tree.children(par)[0]];
    assert_eq!(lp.clauses.collapse().unwrap().associated_loops.len(), 2);
}

#[test]
fn test_entry_keeps_parameter_defaults() {
    let source = "\
def scale(ls, k=2):
    # acc parallel loop
    for x in range(len(ls)):
        ls[x] = ls[x] * k
    return ls";
    let code = compile_function(source, &CompileConfig::default()).unwrap();
    assert!(code.contains("def execute(ls, k=2):\n"));
    assert!(code.contains("def _acc_kernel_1(k, ls, _acc_index):\n"));
}

#[test]
fn test_comment_only_body_gets_pass() {
    let code = compile_function("def f(a):\n    # acc wait\n", &CompileConfig::default()).unwrap();
    assert_eq!(code, "def execute(a):\n    # acc wait\n    pass\n");
}

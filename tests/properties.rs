//! Property-based tests for scanning, region extraction and tree building.
//!
//! Programs are generated as nested statement trees and rendered with
//! four-space indentation, so every generated source is lexically valid.

use proptest::prelude::*;
use pyacc::frontend::region::statement_extent;
use pyacc::frontend::{BlockMarkers, RegionExtractor, Scanner};
use pyacc::ir::{DirectiveTree, NodeId};
use pyacc::utils::source::SourceText;
use std::collections::HashSet;

// ============================================================================
// Strategies for generating test inputs
// ============================================================================

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String),
    Loop(String, Vec<Stmt>),
    Directive(&'static str, Box<Stmt>),
}

fn arb_directive() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("loop"),
        Just("loop independent"),
        Just("parallel"),
        Just("kernels"),
        Just("serial"),
        Just("parallel loop"),
        Just("data copy(a)"),
        Just("atomic update"),
    ]
}

fn arb_stmt() -> impl Strategy<Value = Stmt> {
    let leaf = "v_[a-z]{1,3}".prop_map(Stmt::Assign);
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            ("[ijk]", prop::collection::vec(inner.clone(), 1..3))
                .prop_map(|(var, body)| Stmt::Loop(var, body)),
            (arb_directive(), inner).prop_map(|(d, s)| Stmt::Directive(d, Box::new(s))),
        ]
    })
}

fn render(stmt: &Stmt, depth: usize, out: &mut Vec<String>) {
    let indent = "    ".repeat(depth);
    match stmt {
        Stmt::Assign(name) => out.push(format!("{}{} = 1", indent, name)),
        Stmt::Loop(var, body) => {
            out.push(format!("{}for {} in range(3):", indent, var));
            for s in body {
                render(s, depth + 1, out);
            }
        }
        Stmt::Directive(text, inner) => {
            out.push(format!("{}# acc {}", indent, text));
            render(inner, depth, out);
        }
    }
}

fn arb_program() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_stmt(), 1..5).prop_map(|stmts| {
        let mut lines = vec!["def f(a):".to_string()];
        for s in &stmts {
            render(s, 1, &mut lines);
        }
        lines.push("    return a".to_string());
        lines.join("\n")
    })
}

/// Lines paired with whether the scanner must report them.
fn arb_line() -> impl Strategy<Value = (&'static str, bool)> {
    prop_oneof![
        Just(("x = 1", false)),
        Just(("", false)),
        Just(("# note", false)),
        Just(("# accumulate totals", false)),
        Just(("s = '# acc loop'", false)),
        Just(("# acc parallel", true)),
        Just(("    # acc loop", true)),
        Just(("#acc wait", true)),
        Just(("# pragma acc data", true)),
        Just(("\t#  acc   update self(a)", true)),
    ]
}

fn check_well_formed(tree: &DirectiveTree) -> Result<(), TestCaseError> {
    prop_assert!(tree.validate().is_ok());
    let order = tree.breadth_first();
    prop_assert_eq!(order.len(), tree.len() - 1);

    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(NodeId::ROOT);
    for id in order {
        let parent = tree.parent(id).expect("non-root node without parent");
        prop_assert!(visited.contains(&parent), "{} visited before its parent", id);
        prop_assert!(visited.insert(id));

        let node = &tree[id];
        let p = &tree[parent];
        let hybrid_half = node.hybrid && p.hybrid && p.line == node.line;
        if !p.is_root() && !hybrid_half {
            prop_assert!(p.governs(node.line));
            prop_assert!(p.kind.admits_children());
        }
        if !hybrid_half {
            prop_assert_eq!(tree.at_line(node.line), Some(id));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scanner_reports_annotations_in_source_order(lines in prop::collection::vec(arb_line(), 0..40)) {
        let text: Vec<&str> = lines.iter().map(|(l, _)| *l).collect();
        let source = SourceText::new(&text.join("\n"));
        let scanner = Scanner::new();
        let found: Vec<usize> = scanner.scan(&source).map(|a| a.line).collect();
        let expected: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, (_, annotation))| *annotation)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn scope_regions_are_stable(program in arb_program()) {
        let source = SourceText::new(&program);
        let markers = BlockMarkers::default();
        let extractor = RegionExtractor::new(&source, &markers);
        for annotation in Scanner::new().scan(&source) {
            let line = annotation.line;
            let first = extractor.scope(line);
            let again = extractor.scope(line);
            prop_assert_eq!(first.is_ok(), again.is_ok());
            if let (Ok(region), Ok(repeat)) = (first, again) {
                prop_assert_eq!(region, repeat);
                prop_assert_eq!(region.start_line, line + 1);
                prop_assert!(region.end_line <= source.len());
                let statement = source.next_statement(region.start_line).unwrap();
                prop_assert_eq!(statement_extent(&source, statement), region.end_line);
            }
        }
    }

    #[test]
    fn parsed_trees_are_well_formed(program in arb_program()) {
        let annotations = program.lines().filter(|l| l.trim_start().starts_with("# acc")).count();
        let tree = match pyacc::frontend::parse(&program) {
            Ok(tree) => tree,
            Err(e) => return Err(TestCaseError::fail(format!("{}\n{}", e, program))),
        };
        check_well_formed(&tree)?;
        let hybrids = tree.iter().filter(|(_, n)| n.hybrid && !n.kind.is_compute()).count();
        prop_assert_eq!(tree.len() - 1, annotations + hybrids);
    }

    #[test]
    fn loop_only_programs_always_parse(depth in 1usize..4, width in 1usize..4) {
        let mut lines = vec!["def f(a):".to_string(), "    # acc parallel".to_string(), "    #{".to_string()];
        for w in 0..width {
            for d in 0..depth {
                let indent = "    ".repeat(d + 1);
                lines.push(format!("{}# acc loop", indent));
                lines.push(format!("{}for i{}_{} in range(4):", indent, w, d));
            }
            lines.push(format!("{}a[0] += 1", "    ".repeat(depth + 1)));
        }
        lines.push("    #}".to_string());
        let tree = pyacc::frontend::parse(&lines.join("\n")).unwrap();
        prop_assert_eq!(tree.len(), 2 + depth * width);
        check_well_formed(&tree)?;
        let parallel = tree.at_line(1).unwrap();
        prop_assert_eq!(tree.children(parallel).len(), depth * width);
    }
}

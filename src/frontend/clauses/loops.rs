//! Handlers for loop scheduling clauses.
//!
//! `collapse` and `tile` look at the governed code; `gang`, `worker` and
//! `vector` with explicit sizes look at the enclosing compute construct,
//! which may not yet be in the tree when a fused annotation is parsed.

use super::args;
use super::{ClauseContext, Cursor};
use crate::frontend::nest::associated_loops;
use crate::frontend::pragma::argument_list;
use crate::ir::clause::{
    Clause, ClauseKind, CollapseClause, GangClause, TileClause, VectorClause, WorkerClause,
};
use crate::ir::directive::DirectiveKind;
use crate::ir::node::SourceRegion;
use crate::utils::errors::{
    AccResult, InvalidClauseError, InvalidClauseKind, SyntaxError, SyntaxErrorKind,
};
use crate::utils::source::split_top_level;

type Step<'t> = AccResult<(Clause, Cursor<'t>)>;

fn governed(ctx: &ClauseContext<'_>, kind: ClauseKind) -> AccResult<SourceRegion> {
    ctx.region.ok_or_else(|| {
        SyntaxError::new(
            SyntaxErrorKind::MissingStatement,
            ctx.line,
            format!("`{}` needs a governed loop nest", kind),
        )
        .into()
    })
}

/// `collapse(n)`
pub fn collapse<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    let loop_count = args::positive_literal(arg, ctx.line, kind)?;
    let region = governed(ctx, kind)?;
    let associated_loops = associated_loops(ctx.source, region, loop_count as usize, ctx.line)?;
    Ok((Clause::Collapse(CollapseClause { loop_count, associated_loops }), next))
}

/// `tile(size, ...)`: one size per associated loop.
pub fn tile<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    let sizes = argument_list(arg)
        .iter()
        .map(|s| args::size_expr(s, ctx.line, kind))
        .collect::<AccResult<Vec<_>>>()?;
    if sizes.is_empty() {
        return Err(SyntaxError::new(SyntaxErrorKind::InvalidArgument, ctx.line, "`tile` needs sizes").into());
    }
    let region = governed(ctx, kind)?;
    let associated_loops = associated_loops(ctx.source, region, sizes.len(), ctx.line)?;
    Ok((Clause::Tile(TileClause { sizes, associated_loops }), next))
}

/// Why an explicit size on `clause` is forbidden here, if it is.
///
/// Sizes are only meaningful inside a `kernels` construct that leaves the
/// matching construct-level size (`count_clause`) unset.
fn explicit_size_conflict(ctx: &ClauseContext<'_>, clause: &str, count_clause: ClauseKind) -> Option<String> {
    match ctx.compute_ancestor() {
        None => Some(format!(
            "`{}` with an explicit size must be inside a `kernels` construct",
            clause
        )),
        Some(c) if c.kind != DirectiveKind::Kernels => Some(format!(
            "`{}` with an explicit size is not allowed inside `{}` (line {}); use `{}` on the construct",
            clause, c.kind, c.line, count_clause
        )),
        Some(c) if c.clauses.contains(count_clause) => Some(format!(
            "`{}` with an explicit size conflicts with `{}` on the enclosing `kernels` (line {})",
            clause, count_clause, c.line
        )),
        Some(_) => None,
    }
}

fn check_explicit_size(
    ctx: &ClauseContext<'_>,
    kind: ClauseKind,
    count_clause: ClauseKind,
    written: &str,
) -> AccResult<()> {
    if ctx.kind != DirectiveKind::Loop {
        return Ok(());
    }
    match explicit_size_conflict(ctx, written, count_clause) {
        Some(message) => Err(InvalidClauseError::new(
            InvalidClauseKind::AncestorConflict,
            ctx.line,
            kind.keyword(),
            message,
        )
        .into()),
        None => Ok(()),
    }
}

/// `gang[([num:]n, static:size)]`
pub fn gang<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let mut clause = GangClause::default();
    let Some(arg) = token.argument else {
        return Ok((Clause::Gang(clause), next));
    };
    if ctx.kind != DirectiveKind::Loop {
        args::none(Some(arg), ctx.line, kind)?;
    }
    for item in argument_list(arg) {
        let parts = split_top_level(&item, ':');
        let (name, value) = match parts.as_slice() {
            [value] => ("num", value.trim()),
            [name, value] => (name.trim(), value.trim()),
            _ => ("", ""),
        };
        let duplicate = match name {
            "num" if clause.num.is_none() => {
                clause.num = Some(args::positive_expr(value, ctx.line, kind)?);
                false
            }
            "static" if clause.static_size.is_none() => {
                clause.static_size = Some(args::size_expr(value, ctx.line, kind)?);
                false
            }
            "num" | "static" => true,
            _ => {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::InvalidArgument,
                    ctx.line,
                    format!("unknown `gang` argument `{}`", item),
                )
                .into())
            }
        };
        if duplicate {
            return Err(SyntaxError::new(
                SyntaxErrorKind::InvalidArgument,
                ctx.line,
                format!("`gang` argument `{}` given twice", name),
            )
            .into());
        }
    }
    if clause.num.is_some() {
        check_explicit_size(ctx, kind, ClauseKind::NumGangs, &token_text(kind, arg))?;
    }
    Ok((Clause::Gang(clause), next))
}

/// `worker[([num:]n)]`
pub fn worker<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let count = sized(ctx, kind, token.argument, "num", ClauseKind::NumWorkers)?;
    Ok((Clause::Worker(WorkerClause { count }), next))
}

/// `vector[([length:]n)]`
pub fn vector<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let length = sized(ctx, kind, token.argument, "length", ClauseKind::VectorLength)?;
    Ok((Clause::Vector(VectorClause { length }), next))
}

fn sized(
    ctx: &ClauseContext<'_>,
    kind: ClauseKind,
    arg: Option<&str>,
    modifier: &str,
    count_clause: ClauseKind,
) -> AccResult<Option<u32>> {
    let Some(arg) = arg else { return Ok(None) };
    if ctx.kind != DirectiveKind::Loop {
        args::none(Some(arg), ctx.line, kind)?;
    }
    let (_, value) = args::modifier(arg, modifier);
    let size = args::positive_literal(value, ctx.line, kind)?;
    check_explicit_size(ctx, kind, count_clause, &token_text(kind, arg))?;
    Ok(Some(size))
}

fn token_text(kind: ClauseKind, arg: &str) -> String {
    format!("{}({})", kind, arg.trim())
}

#[cfg(test)]
mod tests {
    use super::super::parse_clauses;
    use super::*;
    use crate::ir::clause::{ClauseSet, IntExpr, SizeExpr};
    use crate::ir::node::DirectiveNode;
    use crate::utils::errors::AccError;
    use crate::utils::source::SourceText;

    const NEST: &str = "# acc loop\nfor i in range(3):\n    for j in range(4):\n        work(i, j)";

    fn parse_under(ancestors: &[&DirectiveNode], tokens: &[&str]) -> AccResult<ClauseSet> {
        let src = SourceText::new(NEST);
        let ctx = ClauseContext {
            kind: DirectiveKind::Loop,
            line: 0,
            region: Some(SourceRegion::new(1, 4)),
            source: &src,
            ancestors,
        };
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        parse_clauses(&ctx, &tokens)
    }

    fn ancestor_conflict(res: AccResult<ClauseSet>) -> bool {
        matches!(res, Err(AccError::InvalidClause(ref e)) if e.kind == InvalidClauseKind::AncestorConflict)
    }

    #[test]
    fn test_collapse() {
        let set = parse_under(&[], &["collapse(2)"]).unwrap();
        let c = set.collapse().unwrap();
        assert_eq!(c.loop_count, 2);
        assert_eq!(c.associated_loops.len(), 2);

        let err = parse_under(&[], &["collapse(3)"]).unwrap_err();
        assert!(matches!(err, AccError::Syntax(_)));
        assert!(err.to_string().contains("expected 3 loops, found 2"));
        assert!(parse_under(&[], &["collapse(0)"]).is_err());
        assert!(parse_under(&[], &["collapse(n)"]).is_err());
    }

    #[test]
    fn test_tile() {
        let set = parse_under(&[], &["tile(*, 8)"]).unwrap();
        let t = set.tile().unwrap();
        assert_eq!(t.sizes, vec![SizeExpr::Auto, SizeExpr::Fixed(IntExpr::Literal(8))]);
        assert_eq!(t.associated_loops.len(), 2);
        assert!(parse_under(&[], &["tile(2, 2, 2)"]).is_err());
    }

    #[test]
    fn test_worker_count_depends_on_ancestor() {
        let parallel = DirectiveNode::new(DirectiveKind::Parallel, 0);
        let kernels = DirectiveNode::new(DirectiveKind::Kernels, 0);
        let root = DirectiveNode::root(4);

        assert!(ancestor_conflict(parse_under(&[&parallel, &root], &["worker(4)"])));
        assert!(ancestor_conflict(parse_under(&[&root], &["worker(4)"])));
        let set = parse_under(&[&kernels, &root], &["worker(4)"]).unwrap();
        assert_eq!(set.worker().unwrap().count, Some(4));
        assert!(parse_under(&[&parallel, &root], &["worker"]).is_ok());
    }

    #[test]
    fn test_kernels_with_construct_level_sizes() {
        let mut kernels = DirectiveNode::new(DirectiveKind::Kernels, 0);
        kernels.clauses.insert(ClauseKind::VectorLength, Clause::Int(IntExpr::Literal(32)));
        assert!(ancestor_conflict(parse_under(&[&kernels], &["vector(length: 16)"])));
        assert!(parse_under(&[&kernels], &["worker(num: 2)"]).is_ok());
    }

    #[test]
    fn test_gang_arguments() {
        let kernels = DirectiveNode::new(DirectiveKind::Kernels, 0);
        let parallel = DirectiveNode::new(DirectiveKind::Parallel, 0);
        let set = parse_under(&[&kernels], &["gang(num: 4, static: *)"]).unwrap();
        let g = set.gang().unwrap();
        assert_eq!(g.num, Some(IntExpr::Literal(4)));
        assert_eq!(g.static_size, Some(SizeExpr::Auto));

        assert!(parse_under(&[&parallel], &["gang(static: 2)"]).is_ok());
        assert!(ancestor_conflict(parse_under(&[&parallel], &["gang(4)"])));
        assert!(parse_under(&[&kernels], &["gang(num: 1, num: 2)"]).is_err());
        assert!(parse_under(&[&kernels], &["gang(dim: 2)"]).is_err());
    }
}

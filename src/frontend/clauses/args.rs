//! Clause argument parsers shared by the handlers.

use crate::frontend::pragma::argument_list;
use crate::ir::clause::{ClauseKind, IntExpr, ReductionClause, ReductionOp, SizeExpr};
use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::source::split_top_level;

fn invalid(line: usize, kind: ClauseKind, msg: impl std::fmt::Display) -> SyntaxError {
    SyntaxError::new(
        SyntaxErrorKind::InvalidArgument,
        line,
        format!("`{}`: {}", kind, msg),
    )
}

/// The argument, or an error naming the clause if it is missing.
pub fn required<'t>(arg: Option<&'t str>, line: usize, kind: ClauseKind) -> AccResult<&'t str> {
    match arg.map(str::trim) {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err(invalid(line, kind, "missing argument").into()),
    }
}

/// Fail if a clause that takes no argument was given one.
pub fn none(arg: Option<&str>, line: usize, kind: ClauseKind) -> AccResult<()> {
    match arg {
        Some(a) => Err(invalid(line, kind, format!("takes no argument, got `({})`", a)).into()),
        None => Ok(()),
    }
}

/// An integer expression: a literal when it parses as one, else source text.
pub fn int_expr(text: &str) -> IntExpr {
    let text = text.trim();
    text.parse::<u64>()
        .map(IntExpr::Literal)
        .unwrap_or_else(|_| IntExpr::Expr(text.to_string()))
}

/// A strictly positive integer literal.
pub fn positive_literal(text: &str, line: usize, kind: ClauseKind) -> AccResult<u32> {
    match text.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(line, kind, format!("`{}` is not a positive integer", text.trim())).into()),
    }
}

/// An integer expression that must be positive when it is a literal.
pub fn positive_expr(text: &str, line: usize, kind: ClauseKind) -> AccResult<IntExpr> {
    let expr = int_expr(text);
    if expr.literal() == Some(0) {
        return Err(invalid(line, kind, "must be positive").into());
    }
    Ok(expr)
}

/// A non-empty variable list.
pub fn var_list(arg: &str, line: usize, kind: ClauseKind) -> AccResult<Vec<String>> {
    let vars = argument_list(arg);
    if vars.is_empty() {
        return Err(invalid(line, kind, "empty variable list").into());
    }
    Ok(vars)
}

/// Split `modifier: rest` if the text starts with the given modifier.
pub fn modifier<'t>(arg: &'t str, name: &str) -> (bool, &'t str) {
    let parts = split_top_level(arg, ':');
    if parts.len() > 1 && parts[0].trim() == name {
        let skip = parts[0].len() + 1;
        (true, arg[skip..].trim())
    } else {
        (false, arg)
    }
}

/// `op: var, ...`
pub fn reduction(arg: &str, line: usize) -> AccResult<ReductionClause> {
    let kind = ClauseKind::Reduction;
    let (op, vars) = arg
        .split_once(':')
        .ok_or_else(|| invalid(line, kind, "expected `operator: variables`"))?;
    let operator = ReductionOp::from_symbol(op.trim())
        .ok_or_else(|| invalid(line, kind, format!("unknown operator `{}`", op.trim())))?;
    let variables = argument_list(vars);
    if variables.is_empty() {
        return Err(SyntaxError::new(
            SyntaxErrorKind::InvalidArgument,
            line,
            format!("reduction over `{}` names no variables", operator.symbol()),
        )
        .into());
    }
    Ok(ReductionClause { operator, variables })
}

/// A tile size or gang `static` size: `*` or a positive expression.
pub fn size_expr(text: &str, line: usize, kind: ClauseKind) -> AccResult<SizeExpr> {
    if text.trim() == "*" {
        Ok(SizeExpr::Auto)
    } else {
        positive_expr(text, line, kind).map(SizeExpr::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_expr() {
        assert_eq!(int_expr(" 8 "), IntExpr::Literal(8));
        assert_eq!(int_expr("n * 2"), IntExpr::Expr("n * 2".into()));
    }

    #[test]
    fn test_positive_literal() {
        assert_eq!(positive_literal("4", 0, ClauseKind::Worker).unwrap(), 4);
        assert!(positive_literal("0", 0, ClauseKind::Worker).is_err());
        assert!(positive_literal("n", 0, ClauseKind::Worker).is_err());
    }

    #[test]
    fn test_modifier() {
        assert_eq!(modifier("readonly: a, b[0:n]", "readonly"), (true, "a, b[0:n]"));
        assert_eq!(modifier("a[0:n]", "readonly"), (false, "a[0:n]"));
        assert_eq!(modifier("num: 4", "num"), (true, "4"));
    }

    #[test]
    fn test_reduction() {
        let r = reduction("+: total, count", 2).unwrap();
        assert_eq!(r.operator, ReductionOp::Add);
        assert_eq!(r.variables, vec!["total", "count"]);
        assert!(reduction("-: x", 2).is_err());
        assert!(reduction("max:", 2).is_err());
        assert!(reduction("total", 2).is_err());
    }
}

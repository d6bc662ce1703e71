//! Handlers for construct-level clauses: queues, conditions, data
//! movement, privatization, and argument-less flags.

use super::args;
use super::{ClauseContext, Cursor};
use crate::frontend::pragma::argument_list;
use crate::ir::clause::{Clause, ClauseKind, DefaultKind, VarList};
use crate::ir::directive::DirectiveKind;
use crate::utils::errors::{AccResult, SyntaxError, SyntaxErrorKind};
use crate::utils::idents::is_identifier;

type Step<'t> = AccResult<(Clause, Cursor<'t>)>;

/// `async[(expr)]`
pub fn async_clause<'t>(_ctx: &ClauseContext<'_>, _kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    Ok((Clause::Async(token.argument.map(args::int_expr)), next))
}

/// `wait[(expr, ...)]`
pub fn wait<'t>(_ctx: &ClauseContext<'_>, _kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let queues = token
        .argument
        .map(|a| argument_list(a).iter().map(|q| args::int_expr(q)).collect())
        .unwrap_or_default();
    Ok((Clause::Wait(queues), next))
}

/// `num_gangs`, `num_workers`, `vector_length`
pub fn positive_int<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    Ok((Clause::Int(args::positive_expr(arg, ctx.line, kind)?), next))
}

/// `default_async`, `device_num`
pub fn int<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    Ok((Clause::Int(args::int_expr(arg)), next))
}

/// `device_type(type, ...)` or `device_type(*)`
pub fn device_type<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    Ok((Clause::DeviceTypes(args::var_list(arg, ctx.line, kind)?), next))
}

/// `if(condition)`
pub fn condition<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    Ok((Clause::Condition(arg.to_string()), next))
}

/// `self`: a variable list on `update`, an optional condition elsewhere.
pub fn self_clause<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let clause = if ctx.kind == DirectiveKind::Update {
        let arg = args::required(token.argument, ctx.line, kind)?;
        Clause::Vars(VarList { readonly: false, vars: args::var_list(arg, ctx.line, kind)? })
    } else {
        match token.argument.map(str::trim) {
            Some(cond) if !cond.is_empty() => Clause::Condition(cond.to_string()),
            _ => Clause::Unconditional,
        }
    };
    Ok((clause, next))
}

/// `reduction(op: var, ...)`
pub fn reduction<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    Ok((Clause::Reduction(vec![args::reduction(arg, ctx.line)?]), next))
}

/// `default(none | present)`
pub fn default<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let value = match args::required(token.argument, ctx.line, kind)? {
        "none" => DefaultKind::None,
        "present" => DefaultKind::Present,
        other => {
            return Err(SyntaxError::new(
                SyntaxErrorKind::InvalidArgument,
                ctx.line,
                format!("`default` takes `none` or `present`, got `{}`", other),
            )
            .into())
        }
    };
    Ok((Clause::Default(value), next))
}

/// `bind(name)`
pub fn bind<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    let name = arg.trim_matches(|c| c == '"' || c == '\'');
    if !is_identifier(name) {
        return Err(SyntaxError::new(
            SyntaxErrorKind::InvalidArgument,
            ctx.line,
            format!("`bind` expects a function name, got `{}`", arg),
        )
        .into());
    }
    Ok((Clause::Bind(name.to_string()), next))
}

/// `copyin([readonly:] var, ...)`
pub fn copyin<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    let (readonly, rest) = args::modifier(arg, "readonly");
    let vars = args::var_list(rest, ctx.line, kind)?;
    Ok((Clause::Vars(VarList { readonly, vars }), next))
}

/// Any clause whose argument is a plain variable list.
pub fn vars<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    let arg = args::required(token.argument, ctx.line, kind)?;
    let vars = args::var_list(arg, ctx.line, kind)?;
    Ok((Clause::Vars(VarList { readonly: false, vars }), next))
}

/// Clauses that take no argument.
pub fn flag<'t>(ctx: &ClauseContext<'_>, kind: ClauseKind, cursor: Cursor<'t>) -> Step<'t> {
    let (token, next) = cursor.take();
    args::none(token.argument, ctx.line, kind)?;
    Ok((Clause::Flag, next))
}

//! Clause state machine.
//!
//! A cursor walks the clause tokens of one annotation. At each step the
//! keyword under the cursor selects a handler; the handler consumes as
//! many tokens as it owns, validates the clause, and returns the parsed
//! value with the advanced cursor. Parsing stops at the first error.
//!
//! After every token is consumed, whole-directive rules run: mutually
//! exclusive clauses and clauses a directive requires.

pub mod args;
pub mod compute;
pub mod loops;

use crate::frontend::pragma::split_keyword;
use crate::ir::clause::{Clause, ClauseKind, ClauseSet};
use crate::ir::directive::DirectiveKind;
use crate::ir::node::{DirectiveNode, SourceRegion};
use crate::utils::errors::{AccResult, InvalidClauseError, InvalidClauseKind};
use crate::utils::source::SourceText;
use log::trace;

/// What a handler may consult besides its own tokens.
#[derive(Debug, Clone, Copy)]
pub struct ClauseContext<'a> {
    pub kind: DirectiveKind,
    pub line: usize,
    pub region: Option<SourceRegion>,
    pub source: &'a SourceText,
    /// Would-be ancestors, nearest first, ending at the root
    pub ancestors: &'a [&'a DirectiveNode],
}

impl<'a> ClauseContext<'a> {
    /// Nearest enclosing compute construct.
    pub fn compute_ancestor(&self) -> Option<&'a DirectiveNode> {
        self.ancestors.iter().copied().find(|n| n.kind.is_compute())
    }
}

/// Position in a clause token list.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'t> {
    tokens: &'t [String],
    index: usize,
}

/// One clause as written: its keyword and parenthesized argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseToken<'t> {
    pub keyword: &'t str,
    pub argument: Option<&'t str>,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [String]) -> Self {
        Self { tokens, index: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.tokens.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw token under the cursor.
    pub fn token(&self) -> Option<&'t str> {
        self.tokens.get(self.index).map(String::as_str)
    }

    /// Keyword of the token under the cursor.
    pub fn keyword(&self) -> Option<&'t str> {
        self.token().map(|t| split_keyword(t).0)
    }

    /// Consume the clause under the cursor. A clause written without an
    /// attached argument absorbs a following `(...)` token.
    pub fn take(self) -> (ClauseToken<'t>, Cursor<'t>) {
        let token = self.token().unwrap_or("");
        let (keyword, mut argument) = split_keyword(token);
        let mut next = Cursor { index: self.index + 1, ..self };
        if argument.is_none() {
            if let Some(following) = next.token().filter(|t| t.starts_with('(')) {
                argument = split_keyword(following).1;
                next.index += 1;
            }
        }
        (ClauseToken { keyword, argument }, next)
    }
}

/// A clause handler: consumes tokens from the cursor and returns the clause value.
pub type Handler = for<'c, 'a, 't> fn(
    &'c ClauseContext<'a>,
    ClauseKind,
    Cursor<'t>,
) -> AccResult<(Clause, Cursor<'t>)>;

fn handler(kind: ClauseKind) -> Handler {
    match kind {
        ClauseKind::Collapse => loops::collapse,
        ClauseKind::Tile => loops::tile,
        ClauseKind::Gang => loops::gang,
        ClauseKind::Worker => loops::worker,
        ClauseKind::Vector => loops::vector,
        ClauseKind::Async => compute::async_clause,
        ClauseKind::Wait => compute::wait,
        ClauseKind::NumGangs | ClauseKind::NumWorkers | ClauseKind::VectorLength => {
            compute::positive_int
        }
        ClauseKind::DefaultAsync | ClauseKind::DeviceNum => compute::int,
        ClauseKind::DeviceType => compute::device_type,
        ClauseKind::If => compute::condition,
        ClauseKind::SelfClause => compute::self_clause,
        ClauseKind::Reduction => compute::reduction,
        ClauseKind::Default => compute::default,
        ClauseKind::Bind => compute::bind,
        ClauseKind::Copyin => compute::copyin,
        ClauseKind::Copy
        | ClauseKind::Copyout
        | ClauseKind::Create
        | ClauseKind::NoCreate
        | ClauseKind::Present
        | ClauseKind::Deviceptr
        | ClauseKind::Attach
        | ClauseKind::Detach
        | ClauseKind::Delete
        | ClauseKind::DeviceResident
        | ClauseKind::Link
        | ClauseKind::UseDevice
        | ClauseKind::Host
        | ClauseKind::Device
        | ClauseKind::Private
        | ClauseKind::Firstprivate => compute::vars,
        ClauseKind::Seq
        | ClauseKind::Auto
        | ClauseKind::Independent
        | ClauseKind::Read
        | ClauseKind::Write
        | ClauseKind::Update
        | ClauseKind::Capture
        | ClauseKind::Nohost
        | ClauseKind::IfPresent
        | ClauseKind::Finalize => compute::flag,
    }
}

/// Run one step of the machine: resolve the keyword under the cursor and
/// hand the cursor to its handler.
pub fn step<'t>(
    ctx: &ClauseContext<'_>,
    cursor: Cursor<'t>,
) -> AccResult<(ClauseKind, Clause, Cursor<'t>)> {
    let token = cursor.token().unwrap_or("");
    let keyword = cursor.keyword().unwrap_or("");
    let kind = ClauseKind::from_keyword(keyword)
        .filter(|k| ctx.kind.accepts(*k))
        .ok_or_else(|| unrecognized(ctx, keyword, token))?;
    let (clause, next) = handler(kind)(ctx, kind, cursor)?;
    trace!("line {}: clause `{}` -> {:?}", ctx.line, kind, clause);
    Ok((kind, clause, next))
}

fn unrecognized(ctx: &ClauseContext<'_>, keyword: &str, token: &str) -> InvalidClauseError {
    let name = if keyword.is_empty() { token } else { keyword };
    InvalidClauseError::new(
        InvalidClauseKind::Unrecognized,
        ctx.line,
        name,
        format!("`{}` is not a clause of `{}`", name, ctx.kind),
    )
    .with_expected(ctx.kind.legal_clauses().iter().map(|k| k.keyword()))
}

/// Parse every clause token of one directive.
pub fn parse_clauses(ctx: &ClauseContext<'_>, tokens: &[String]) -> AccResult<ClauseSet> {
    let mut clauses = ClauseSet::new();
    let mut cursor = Cursor::new(tokens);
    while !cursor.is_done() {
        let (kind, clause, next) = step(ctx, cursor)?;
        store(ctx, &mut clauses, kind, clause)?;
        cursor = next;
    }
    check_exclusive(ctx, &clauses)?;
    check_required(ctx, &clauses)?;
    Ok(clauses)
}

fn store(
    ctx: &ClauseContext<'_>,
    clauses: &mut ClauseSet,
    kind: ClauseKind,
    clause: Clause,
) -> AccResult<()> {
    if let Some(existing) = clauses.get_mut(kind) {
        if kind.is_repeatable() && existing.merge(clause) {
            return Ok(());
        }
        return Err(InvalidClauseError::new(
            InvalidClauseKind::Duplicate,
            ctx.line,
            kind.keyword(),
            format!("`{}` may appear only once on `{}`", kind, ctx.kind),
        )
        .into());
    }
    clauses.insert(kind, clause);
    Ok(())
}

type Exclusions = &'static [(ClauseKind, &'static [ClauseKind])];

const LOOP_EXCLUSIONS: Exclusions = &[
    (
        ClauseKind::Seq,
        &[ClauseKind::Gang, ClauseKind::Worker, ClauseKind::Vector, ClauseKind::Auto, ClauseKind::Independent],
    ),
    (ClauseKind::Auto, &[ClauseKind::Independent]),
];

const ROUTINE_EXCLUSIONS: Exclusions = &[
    (ClauseKind::Seq, &[ClauseKind::Gang, ClauseKind::Worker, ClauseKind::Vector]),
    (ClauseKind::Gang, &[ClauseKind::Worker, ClauseKind::Vector]),
    (ClauseKind::Worker, &[ClauseKind::Vector]),
];

const ATOMIC_EXCLUSIONS: Exclusions = &[
    (ClauseKind::Read, &[ClauseKind::Write, ClauseKind::Update, ClauseKind::Capture]),
    (ClauseKind::Write, &[ClauseKind::Update, ClauseKind::Capture]),
    (ClauseKind::Update, &[ClauseKind::Capture]),
];

/// Each entry pairs a clause with the clauses it excludes.
fn exclusions(kind: DirectiveKind) -> Exclusions {
    match kind {
        DirectiveKind::Loop => LOOP_EXCLUSIONS,
        DirectiveKind::Routine => ROUTINE_EXCLUSIONS,
        DirectiveKind::Atomic => ATOMIC_EXCLUSIONS,
        _ => &[],
    }
}

fn check_exclusive(ctx: &ClauseContext<'_>, clauses: &ClauseSet) -> AccResult<()> {
    for (first, excluded) in exclusions(ctx.kind) {
        if !clauses.contains(*first) {
            continue;
        }
        if let Some(other) = excluded.iter().find(|k| clauses.contains(**k)) {
            return Err(InvalidClauseError::new(
                InvalidClauseKind::Conflicting,
                ctx.line,
                other.keyword(),
                format!("`{}` cannot be combined with `{}` on `{}`", other, first, ctx.kind),
            )
            .into());
        }
    }
    Ok(())
}

fn check_required(ctx: &ClauseContext<'_>, clauses: &ClauseSet) -> AccResult<()> {
    use ClauseKind as C;
    let one_of: &[ClauseKind] = match ctx.kind {
        DirectiveKind::Update => &[C::SelfClause, C::Host, C::Device],
        DirectiveKind::Set => &[C::DefaultAsync, C::DeviceNum, C::DeviceType],
        DirectiveKind::EnterData => &[C::Copyin, C::Create, C::Attach],
        DirectiveKind::ExitData => &[C::Copyout, C::Delete, C::Detach],
        _ => return Ok(()),
    };
    if one_of.iter().any(|k| clauses.contains(*k)) {
        return Ok(());
    }
    let names: Vec<&str> = one_of.iter().map(|k| k.keyword()).collect();
    Err(InvalidClauseError::new(
        InvalidClauseKind::Missing,
        ctx.line,
        "",
        format!("`{}` needs at least one data clause", ctx.kind),
    )
    .with_expected(names)
    .into())
}

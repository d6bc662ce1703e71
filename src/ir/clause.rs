//! Clause kinds and their typed values.
//!
//! A clause value carries only what a backend needs to generate code;
//! it never carries executable behaviour. Values are produced by the
//! clause state machine in `frontend::clauses`.

use crate::utils::pretty::format_list;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Every clause keyword, across all directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClauseKind {
    Async,
    Wait,
    NumGangs,
    NumWorkers,
    VectorLength,
    DeviceType,
    If,
    /// `self`: a condition on compute constructs, a variable list on `update`
    SelfClause,
    Reduction,
    Copy,
    Copyin,
    Copyout,
    Create,
    NoCreate,
    Present,
    Deviceptr,
    Attach,
    Detach,
    Delete,
    DeviceResident,
    Link,
    UseDevice,
    Host,
    Device,
    Private,
    Firstprivate,
    Default,
    Collapse,
    Gang,
    Worker,
    Vector,
    Seq,
    Auto,
    Tile,
    Independent,
    Read,
    Write,
    /// Atomic `update` form
    Update,
    Capture,
    Bind,
    Nohost,
    IfPresent,
    Finalize,
    DefaultAsync,
    DeviceNum,
}

impl ClauseKind {
    /// Every clause kind.
    pub const ALL: &'static [ClauseKind] = &[
        ClauseKind::Async, ClauseKind::Wait, ClauseKind::NumGangs, ClauseKind::NumWorkers,
        ClauseKind::VectorLength, ClauseKind::DeviceType, ClauseKind::If, ClauseKind::SelfClause,
        ClauseKind::Reduction, ClauseKind::Copy, ClauseKind::Copyin, ClauseKind::Copyout,
        ClauseKind::Create, ClauseKind::NoCreate, ClauseKind::Present, ClauseKind::Deviceptr,
        ClauseKind::Attach, ClauseKind::Detach, ClauseKind::Delete, ClauseKind::DeviceResident,
        ClauseKind::Link, ClauseKind::UseDevice, ClauseKind::Host, ClauseKind::Device,
        ClauseKind::Private, ClauseKind::Firstprivate, ClauseKind::Default, ClauseKind::Collapse,
        ClauseKind::Gang, ClauseKind::Worker, ClauseKind::Vector, ClauseKind::Seq,
        ClauseKind::Auto, ClauseKind::Tile, ClauseKind::Independent, ClauseKind::Read,
        ClauseKind::Write, ClauseKind::Update, ClauseKind::Capture, ClauseKind::Bind,
        ClauseKind::Nohost, ClauseKind::IfPresent, ClauseKind::Finalize,
        ClauseKind::DefaultAsync, ClauseKind::DeviceNum,
    ];

    /// The clause keyword as written in an annotation.
    pub fn keyword(self) -> &'static str {
        match self {
            ClauseKind::Async => "async",
            ClauseKind::Wait => "wait",
            ClauseKind::NumGangs => "num_gangs",
            ClauseKind::NumWorkers => "num_workers",
            ClauseKind::VectorLength => "vector_length",
            ClauseKind::DeviceType => "device_type",
            ClauseKind::If => "if",
            ClauseKind::SelfClause => "self",
            ClauseKind::Reduction => "reduction",
            ClauseKind::Copy => "copy",
            ClauseKind::Copyin => "copyin",
            ClauseKind::Copyout => "copyout",
            ClauseKind::Create => "create",
            ClauseKind::NoCreate => "no_create",
            ClauseKind::Present => "present",
            ClauseKind::Deviceptr => "deviceptr",
            ClauseKind::Attach => "attach",
            ClauseKind::Detach => "detach",
            ClauseKind::Delete => "delete",
            ClauseKind::DeviceResident => "device_resident",
            ClauseKind::Link => "link",
            ClauseKind::UseDevice => "use_device",
            ClauseKind::Host => "host",
            ClauseKind::Device => "device",
            ClauseKind::Private => "private",
            ClauseKind::Firstprivate => "firstprivate",
            ClauseKind::Default => "default",
            ClauseKind::Collapse => "collapse",
            ClauseKind::Gang => "gang",
            ClauseKind::Worker => "worker",
            ClauseKind::Vector => "vector",
            ClauseKind::Seq => "seq",
            ClauseKind::Auto => "auto",
            ClauseKind::Tile => "tile",
            ClauseKind::Independent => "independent",
            ClauseKind::Read => "read",
            ClauseKind::Write => "write",
            ClauseKind::Update => "update",
            ClauseKind::Capture => "capture",
            ClauseKind::Bind => "bind",
            ClauseKind::Nohost => "nohost",
            ClauseKind::IfPresent => "if_present",
            ClauseKind::Finalize => "finalize",
            ClauseKind::DefaultAsync => "default_async",
            ClauseKind::DeviceNum => "device_num",
        }
    }

    /// Look up a clause by keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.keyword() == keyword)
    }

    /// Clauses whose repeated occurrences merge instead of conflicting.
    pub fn is_repeatable(self) -> bool {
        matches!(
            self,
            ClauseKind::Wait
                | ClauseKind::DeviceType
                | ClauseKind::Reduction
                | ClauseKind::Copy
                | ClauseKind::Copyin
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
                | ClauseKind::Firstprivate
        )
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An integer-valued clause argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntExpr {
    /// A literal known at compile time
    Literal(u64),
    /// Any other expression, kept as host source text
    Expr(String),
}

impl IntExpr {
    /// The literal value, if this is a literal.
    pub fn literal(&self) -> Option<u64> {
        match self {
            IntExpr::Literal(v) => Some(*v),
            IntExpr::Expr(_) => None,
        }
    }
}

impl fmt::Display for IntExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntExpr::Literal(v) => write!(f, "{}", v),
            IntExpr::Expr(e) => f.write_str(e),
        }
    }
}

/// A variable list, as used by data, privatization and `self`/`host`/`device` clauses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VarList {
    /// `readonly:` modifier (`copyin` only)
    pub readonly: bool,
    /// Variables or subarrays, as written
    pub vars: Vec<String>,
}

impl fmt::Display for VarList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.readonly {
            f.write_str("readonly: ")?;
        }
        f.write_str(&self.vars.join(", "))
    }
}

/// Reduction operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionOp {
    Add,
    Mul,
    Max,
    Min,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl ReductionOp {
    /// Parse an operator symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => ReductionOp::Add,
            "*" => ReductionOp::Mul,
            "max" => ReductionOp::Max,
            "min" => ReductionOp::Min,
            "&" => ReductionOp::BitAnd,
            "|" => ReductionOp::BitOr,
            "^" => ReductionOp::BitXor,
            "&&" => ReductionOp::And,
            "||" => ReductionOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// The operator symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            ReductionOp::Add => "+",
            ReductionOp::Mul => "*",
            ReductionOp::Max => "max",
            ReductionOp::Min => "min",
            ReductionOp::BitAnd => "&",
            ReductionOp::BitOr => "|",
            ReductionOp::BitXor => "^",
            ReductionOp::And => "&&",
            ReductionOp::Or => "||",
        }
    }
}

/// `reduction(operator: var-list)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionClause {
    pub operator: ReductionOp,
    pub variables: Vec<String>,
}

impl fmt::Display for ReductionClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operator.symbol(), self.variables.join(", "))
    }
}

/// One loop associated with a `collapse` or `tile` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedLoop {
    /// Line of the `for` statement
    pub line: usize,
    /// Left-justified source of the whole loop statement
    pub source: String,
    /// Variables referenced anywhere in the loop
    pub variables: BTreeSet<String>,
    /// Loop target (`i` in `for i in range(n)`)
    pub target: String,
    /// Iterable expression (`range(n)`)
    pub iterable: String,
}

/// `collapse(n)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseClause {
    /// Number of tightly nested loops, always positive
    pub loop_count: u32,
    /// The associated loops, outermost first
    pub associated_loops: Vec<AssociatedLoop>,
}

/// A `tile` size or `gang(static:...)` chunk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeExpr {
    /// `*`: the implementation picks
    Auto,
    Fixed(IntExpr),
}

impl fmt::Display for SizeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeExpr::Auto => f.write_str("*"),
            SizeExpr::Fixed(e) => write!(f, "{}", e),
        }
    }
}

/// `tile(size, ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileClause {
    /// Sizes as written; the first applies to the innermost loop
    pub sizes: Vec<SizeExpr>,
    /// The associated loops, outermost first
    pub associated_loops: Vec<AssociatedLoop>,
}

/// `gang[(gang-arg-list)]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GangClause {
    /// `[num:]int-expr`
    pub num: Option<IntExpr>,
    /// `static:size-expr`
    pub static_size: Option<SizeExpr>,
}

/// `worker[([num:]n)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerClause {
    pub count: Option<u32>,
}

/// `vector[([length:]n)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorClause {
    pub length: Option<u32>,
}

/// `default(none | present)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultKind {
    None,
    Present,
}

/// A parsed clause value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clause {
    /// `async[(expr)]`
    Async(Option<IntExpr>),
    /// `wait[(expr, ...)]`
    Wait(Vec<IntExpr>),
    /// `num_gangs`, `num_workers`, `vector_length`, `default_async`, `device_num`
    Int(IntExpr),
    /// `device_type(type, ...)`
    DeviceTypes(Vec<String>),
    /// `if(condition)` or `self(condition)`
    Condition(String),
    /// `self` with no condition
    Unconditional,
    Reduction(Vec<ReductionClause>),
    /// Any clause whose argument is a variable list
    Vars(VarList),
    Default(DefaultKind),
    Collapse(CollapseClause),
    Tile(TileClause),
    Gang(GangClause),
    Worker(WorkerClause),
    Vector(VectorClause),
    /// `bind(name)`
    Bind(String),
    /// Argument-less clauses (`seq`, `auto`, `independent`, atomic forms, ...)
    Flag,
}

impl Clause {
    /// Merge a repeated occurrence of the same clause into this one.
    /// Returns false if the two values cannot be merged.
    pub fn merge(&mut self, other: Clause) -> bool {
        match (self, other) {
            (Clause::Vars(a), Clause::Vars(b)) => {
                a.readonly |= b.readonly;
                a.vars.extend(b.vars);
                true
            }
            (Clause::Reduction(a), Clause::Reduction(b)) => {
                a.extend(b);
                true
            }
            (Clause::Wait(a), Clause::Wait(b)) => {
                a.extend(b);
                true
            }
            (Clause::DeviceTypes(a), Clause::DeviceTypes(b)) => {
                a.extend(b);
                true
            }
            _ => false,
        }
    }

    /// Render the clause's argument list, if it has one.
    pub fn argument(&self) -> Option<String> {
        match self {
            Clause::Async(e) => e.as_ref().map(ToString::to_string),
            Clause::Wait(v) if !v.is_empty() => Some(format_list(v, ", ")),
            Clause::Wait(_) => None,
            Clause::Int(e) => Some(e.to_string()),
            Clause::DeviceTypes(v) => Some(v.join(", ")),
            Clause::Condition(c) => Some(c.clone()),
            Clause::Unconditional | Clause::Flag => None,
            Clause::Reduction(r) => Some(format_list(r, ", ")),
            Clause::Vars(v) => Some(v.to_string()),
            Clause::Default(DefaultKind::None) => Some("none".to_string()),
            Clause::Default(DefaultKind::Present) => Some("present".to_string()),
            Clause::Collapse(c) => Some(c.loop_count.to_string()),
            Clause::Tile(t) => Some(format_list(&t.sizes, ", ")),
            Clause::Gang(g) => {
                let mut args = Vec::new();
                if let Some(n) = &g.num {
                    args.push(format!("num: {}", n));
                }
                if let Some(s) = &g.static_size {
                    args.push(format!("static: {}", s));
                }
                (!args.is_empty()).then(|| args.join(", "))
            }
            Clause::Worker(w) => w.count.map(|c| c.to_string()),
            Clause::Vector(v) => v.length.map(|l| l.to_string()),
            Clause::Bind(name) => Some(name.clone()),
        }
    }
}

/// The clauses present on one directive, keyed by kind.
///
/// A key is present only if the clause actually appeared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClauseSet {
    clauses: BTreeMap<ClauseKind, Clause>,
}

impl ClauseSet {
    /// Create an empty clause set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a clause, replacing any previous value.
    pub fn insert(&mut self, kind: ClauseKind, clause: Clause) {
        self.clauses.insert(kind, clause);
    }

    /// Get a clause by kind.
    pub fn get(&self, kind: ClauseKind) -> Option<&Clause> {
        self.clauses.get(&kind)
    }

    pub(crate) fn get_mut(&mut self, kind: ClauseKind) -> Option<&mut Clause> {
        self.clauses.get_mut(&kind)
    }

    /// Whether the clause appeared.
    pub fn contains(&self, kind: ClauseKind) -> bool {
        self.clauses.contains_key(&kind)
    }

    /// Number of distinct clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True if no clause appeared.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterate over clauses in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ClauseKind, &Clause)> {
        self.clauses.iter().map(|(k, v)| (*k, v))
    }

    pub fn collapse(&self) -> Option<&CollapseClause> {
        match self.get(ClauseKind::Collapse) {
            Some(Clause::Collapse(c)) => Some(c),
            _ => None,
        }
    }

    pub fn tile(&self) -> Option<&TileClause> {
        match self.get(ClauseKind::Tile) {
            Some(Clause::Tile(t)) => Some(t),
            _ => None,
        }
    }

    pub fn gang(&self) -> Option<&GangClause> {
        match self.get(ClauseKind::Gang) {
            Some(Clause::Gang(g)) => Some(g),
            _ => None,
        }
    }

    pub fn worker(&self) -> Option<&WorkerClause> {
        match self.get(ClauseKind::Worker) {
            Some(Clause::Worker(w)) => Some(w),
            _ => None,
        }
    }

    pub fn vector(&self) -> Option<&VectorClause> {
        match self.get(ClauseKind::Vector) {
            Some(Clause::Vector(v)) => Some(v),
            _ => None,
        }
    }

    /// All reductions on the directive.
    pub fn reductions(&self) -> &[ReductionClause] {
        match self.get(ClauseKind::Reduction) {
            Some(Clause::Reduction(r)) => r,
            _ => &[],
        }
    }

    /// The value of an integer clause such as `num_gangs`.
    pub fn int(&self, kind: ClauseKind) -> Option<&IntExpr> {
        match self.get(kind) {
            Some(Clause::Int(e)) => Some(e),
            _ => None,
        }
    }

    /// The variable list of a data-style clause.
    pub fn vars(&self, kind: ClauseKind) -> Option<&VarList> {
        match self.get(kind) {
            Some(Clause::Vars(v)) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ClauseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .iter()
            .map(|(kind, clause)| match clause.argument() {
                Some(arg) => format!("{}({})", kind, arg),
                None => kind.to_string(),
            })
            .collect();
        f.write_str(&rendered.join(" "))
    }
}

//! Directive kinds and the clauses each one accepts.

use crate::ir::clause::ClauseKind;
use crate::ir::clause::ClauseKind as C;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a directive's governed region is found in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionStrategy {
    /// Standalone directive; governs nothing
    None,
    /// Governs the next statement, found from indentation
    Scope,
    /// Governs an explicitly delimited block if one follows, else the next statement
    ScopeOrDelimiter,
}

/// Every directive kind the frontend understands, plus the synthetic root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    /// Synthetic root of every tree
    Root,
    Parallel,
    Kernels,
    Serial,
    Data,
    HostData,
    Loop,
    Atomic,
    Cache,
    Declare,
    Routine,
    Update,
    Wait,
    Set,
    Init,
    Shutdown,
    EnterData,
    ExitData,
}

const COMPUTE_COMMON: &[ClauseKind] = &[
    C::Async, C::Wait, C::DeviceType, C::If, C::SelfClause, C::Copy, C::Copyin, C::Copyout,
    C::Create, C::NoCreate, C::Present, C::Deviceptr, C::Attach, C::Default,
];

const PARALLEL: &[ClauseKind] = &[
    C::NumGangs, C::NumWorkers, C::VectorLength, C::Reduction, C::Private, C::Firstprivate,
];
const KERNELS: &[ClauseKind] = &[C::NumGangs, C::NumWorkers, C::VectorLength];
const SERIAL: &[ClauseKind] = &[C::Reduction, C::Private, C::Firstprivate];
const DATA: &[ClauseKind] = &[
    C::If, C::Copy, C::Copyin, C::Copyout, C::Create, C::NoCreate, C::Present, C::Deviceptr,
    C::Attach, C::Default,
];
const HOST_DATA: &[ClauseKind] = &[C::UseDevice, C::If, C::IfPresent];
const LOOP: &[ClauseKind] = &[
    C::Collapse, C::Gang, C::Worker, C::Vector, C::Seq, C::Auto, C::Tile, C::DeviceType,
    C::Independent, C::Private, C::Reduction,
];
const ATOMIC: &[ClauseKind] = &[C::Read, C::Write, C::Update, C::Capture];
const DECLARE: &[ClauseKind] = &[
    C::Copy, C::Copyin, C::Copyout, C::Create, C::Present, C::Deviceptr, C::DeviceResident,
    C::Link,
];
const ROUTINE: &[ClauseKind] = &[
    C::Gang, C::Worker, C::Vector, C::Seq, C::Bind, C::DeviceType, C::Nohost,
];
const UPDATE: &[ClauseKind] = &[
    C::Async, C::Wait, C::DeviceType, C::If, C::IfPresent, C::SelfClause, C::Host, C::Device,
];
const WAIT: &[ClauseKind] = &[C::Async];
const SET: &[ClauseKind] = &[C::DefaultAsync, C::DeviceNum, C::DeviceType];
const INIT: &[ClauseKind] = &[C::DeviceType, C::DeviceNum, C::If];
const ENTER_DATA: &[ClauseKind] = &[C::If, C::Async, C::Wait, C::Copyin, C::Create, C::Attach];
const EXIT_DATA: &[ClauseKind] = &[
    C::If, C::Async, C::Wait, C::Copyout, C::Delete, C::Detach, C::Finalize,
];

impl DirectiveKind {
    /// All directive kinds that can appear in source, in keyword order.
    pub const SOURCE_KINDS: &'static [DirectiveKind] = &[
        DirectiveKind::Parallel,
        DirectiveKind::Kernels,
        DirectiveKind::Serial,
        DirectiveKind::Data,
        DirectiveKind::HostData,
        DirectiveKind::Loop,
        DirectiveKind::Atomic,
        DirectiveKind::Cache,
        DirectiveKind::Declare,
        DirectiveKind::Routine,
        DirectiveKind::Update,
        DirectiveKind::Wait,
        DirectiveKind::Set,
        DirectiveKind::Init,
        DirectiveKind::Shutdown,
        DirectiveKind::EnterData,
        DirectiveKind::ExitData,
    ];

    /// Look up a directive by its annotation keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword {
            "parallel" => DirectiveKind::Parallel,
            "kernels" => DirectiveKind::Kernels,
            "serial" => DirectiveKind::Serial,
            "data" => DirectiveKind::Data,
            "host_data" => DirectiveKind::HostData,
            "loop" => DirectiveKind::Loop,
            "atomic" => DirectiveKind::Atomic,
            "cache" => DirectiveKind::Cache,
            "declare" => DirectiveKind::Declare,
            "routine" => DirectiveKind::Routine,
            "update" => DirectiveKind::Update,
            "wait" => DirectiveKind::Wait,
            "set" => DirectiveKind::Set,
            "init" => DirectiveKind::Init,
            "shutdown" => DirectiveKind::Shutdown,
            "enter_data" => DirectiveKind::EnterData,
            "exit_data" => DirectiveKind::ExitData,
            _ => return None,
        };
        Some(kind)
    }

    /// The annotation keyword for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Root => "root",
            DirectiveKind::Parallel => "parallel",
            DirectiveKind::Kernels => "kernels",
            DirectiveKind::Serial => "serial",
            DirectiveKind::Data => "data",
            DirectiveKind::HostData => "host_data",
            DirectiveKind::Loop => "loop",
            DirectiveKind::Atomic => "atomic",
            DirectiveKind::Cache => "cache",
            DirectiveKind::Declare => "declare",
            DirectiveKind::Routine => "routine",
            DirectiveKind::Update => "update",
            DirectiveKind::Wait => "wait",
            DirectiveKind::Set => "set",
            DirectiveKind::Init => "init",
            DirectiveKind::Shutdown => "shutdown",
            DirectiveKind::EnterData => "enter_data",
            DirectiveKind::ExitData => "exit_data",
        }
    }

    /// Compute constructs (`parallel`, `kernels`, `serial`).
    ///
    /// These are the only kinds that admit nested directives as children,
    /// and the only kinds that may fuse with `loop` on one annotation line.
    pub fn is_compute(self) -> bool {
        matches!(
            self,
            DirectiveKind::Parallel | DirectiveKind::Kernels | DirectiveKind::Serial
        )
    }

    /// Whether nodes of this kind may have children in the tree.
    pub fn admits_children(self) -> bool {
        self == DirectiveKind::Root || self.is_compute()
    }

    /// How this kind's governed region is extracted.
    pub fn region_strategy(self) -> RegionStrategy {
        match self {
            DirectiveKind::Loop | DirectiveKind::Routine => RegionStrategy::Scope,
            DirectiveKind::Parallel
            | DirectiveKind::Kernels
            | DirectiveKind::Serial
            | DirectiveKind::Data
            | DirectiveKind::HostData
            | DirectiveKind::Atomic => RegionStrategy::ScopeOrDelimiter,
            DirectiveKind::Root
            | DirectiveKind::Cache
            | DirectiveKind::Declare
            | DirectiveKind::Update
            | DirectiveKind::Wait
            | DirectiveKind::Set
            | DirectiveKind::Init
            | DirectiveKind::Shutdown
            | DirectiveKind::EnterData
            | DirectiveKind::ExitData => RegionStrategy::None,
        }
    }

    /// The clauses this directive accepts.
    pub fn legal_clauses(self) -> Vec<ClauseKind> {
        match self {
            DirectiveKind::Parallel => [COMPUTE_COMMON, PARALLEL].concat(),
            DirectiveKind::Kernels => [COMPUTE_COMMON, KERNELS].concat(),
            DirectiveKind::Serial => [COMPUTE_COMMON, SERIAL].concat(),
            DirectiveKind::Data => DATA.to_vec(),
            DirectiveKind::HostData => HOST_DATA.to_vec(),
            DirectiveKind::Loop => LOOP.to_vec(),
            DirectiveKind::Atomic => ATOMIC.to_vec(),
            DirectiveKind::Declare => DECLARE.to_vec(),
            DirectiveKind::Routine => ROUTINE.to_vec(),
            DirectiveKind::Update => UPDATE.to_vec(),
            DirectiveKind::Wait => WAIT.to_vec(),
            DirectiveKind::Set => SET.to_vec(),
            DirectiveKind::Init | DirectiveKind::Shutdown => INIT.to_vec(),
            DirectiveKind::EnterData => ENTER_DATA.to_vec(),
            DirectiveKind::ExitData => EXIT_DATA.to_vec(),
            DirectiveKind::Root | DirectiveKind::Cache => Vec::new(),
        }
    }

    /// Whether this directive accepts the given clause.
    pub fn accepts(self, clause: ClauseKind) -> bool {
        self.legal_clauses().contains(&clause)
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

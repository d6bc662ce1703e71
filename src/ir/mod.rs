//! Intermediate representation for parsed directives.
//!
//! - `directive`: directive kinds and the clauses each accepts
//! - `clause`: typed clause values
//! - `node`: directive nodes and source regions
//! - `tree`: the directive tree and its builder operations
//! - `context`: the calling context handed in by the context extractor
//! - `icv`: internal control variables updated by `set`

pub mod clause;
pub mod context;
pub mod directive;
pub mod icv;
pub mod node;
pub mod tree;

pub use clause::{
    AssociatedLoop, Clause, ClauseKind, ClauseSet, CollapseClause, DefaultKind, GangClause,
    IntExpr, ReductionClause, ReductionOp, SizeExpr, TileClause, VarList, VectorClause,
    WorkerClause,
};
pub use context::{FunctionContext, ModuleAlias};
pub use directive::{DirectiveKind, RegionStrategy};
pub use icv::Icvs;
pub use node::{DirectiveArgument, DirectiveNode, NodeId, SourceRegion};
pub use tree::{DirectiveTree, NestedNode};

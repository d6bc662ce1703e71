//! Internal control variables.
//!
//! The values a runtime would consult when a construct leaves something
//! unspecified: which device type and device number to run on, and which
//! async queue an argument-less `async` clause means. They start at the
//! backend's defaults and are updated by `set` directives.

use crate::ir::clause::{Clause, ClauseKind, ClauseSet, IntExpr};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device type of the host.
pub const HOST_DEVICE: &str = "host";

/// Internal control variables seen by code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icvs {
    pub device_type: String,
    pub device_num: IntExpr,
    /// Queue for an `async` clause without an argument; `None` is synchronous
    pub default_async: Option<IntExpr>,
}

impl Default for Icvs {
    fn default() -> Self {
        Self {
            device_type: HOST_DEVICE.to_string(),
            device_num: IntExpr::Literal(0),
            default_async: None,
        }
    }
}

impl Icvs {
    /// Apply the clauses of a `set` directive. Returns whether anything changed.
    pub fn apply_set(&mut self, clauses: &ClauseSet) -> bool {
        let before = self.clone();
        if let Some(Clause::DeviceTypes(types)) = clauses.get(ClauseKind::DeviceType) {
            if let Some(first) = types.first() {
                self.device_type = first.clone();
            }
        }
        if let Some(num) = clauses.int(ClauseKind::DeviceNum) {
            self.device_num = num.clone();
        }
        if let Some(queue) = clauses.int(ClauseKind::DefaultAsync) {
            self.default_async = Some(queue.clone());
        }
        *self != before
    }

    /// Whether the current device type runs on the host.
    pub fn targets_host(&self) -> bool {
        self.device_type == HOST_DEVICE || self.device_type == "*"
    }
}

impl fmt::Display for Icvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device_type={} device_num={}", self.device_type, self.device_num)?;
        match &self.default_async {
            Some(queue) => write!(f, " default_async={}", queue),
            None => f.write_str(" default_async=sync"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse;
    use crate::ir::node::NodeId;

    fn set_clauses(annotation: &str) -> ClauseSet {
        let tree = parse(&format!("{}\nx = 1", annotation)).unwrap();
        let id = tree.children(NodeId::ROOT)[0];
        tree[id].clauses.clone()
    }

    #[test]
    fn test_defaults_target_host() {
        let icvs = Icvs::default();
        assert!(icvs.targets_host());
        assert_eq!(icvs.to_string(), "device_type=host device_num=0 default_async=sync");
    }

    #[test]
    fn test_set_updates_only_given_variables() {
        let mut icvs = Icvs::default();
        assert!(icvs.apply_set(&set_clauses("# acc set device_num(2) default_async(q)")));
        assert_eq!(icvs.device_type, HOST_DEVICE);
        assert_eq!(icvs.device_num, IntExpr::Literal(2));
        assert_eq!(icvs.default_async, Some(IntExpr::Expr("q".to_string())));

        assert!(icvs.apply_set(&set_clauses("# acc set device_type(nvidia)")));
        assert!(!icvs.targets_host());
        assert!(!icvs.apply_set(&set_clauses("# acc set device_type(nvidia)")));
    }
}

//! Rule-based dataset validation.
//!
//! * `datapoint`: row-wise rulesets (`check_datapoint`).
//! * `simple`: boolean condition datasets (`check`).
//! * `hierarchy`: linear relations between codes of one identifier (`check_hierarchy`).
pub mod datapoint;
pub mod hierarchy;
pub mod ruleset;
pub mod simple;

pub use ruleset::{
    positional_rule_id, DataPointRuleset, DatapointRule, HierarchicalRule, HierarchicalRuleset, HierarchyItem,
    InputMode, OutputMode, RuleVariable, RulesetKind, Sign, ValidationMode,
};

// --- Output component names ---
pub const RULE_ID: &str = "ruleid";
pub const BOOL_VAR: &str = "bool_var";
pub const IMBALANCE: &str = "imbalance";
pub const ERROR_CODE: &str = "errorcode";
pub const ERROR_LEVEL: &str = "errorlevel";

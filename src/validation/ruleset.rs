//! Rulesets and the modes that steer the validation operators.
use crate::compiler::ast::Expr;
use crate::expression::BinaryOp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether ruleset variables name components or value domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetKind {
    Variable,
    ValueDomain,
}

/// Which evaluated (row or group, rule) pairs a validation emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Only failing pairs. Also the default.
    #[default]
    Invalid,
    All,
    AllMeasures,
}

/// How `check_hierarchy` treats missing and null items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    #[default]
    NonNull,
    NonZero,
    PartialNull,
    PartialZero,
    AlwaysNull,
    AlwaysZero,
}

impl ValidationMode {
    /// Missing items count as zero rather than null.
    pub fn substitutes_zero(&self) -> bool {
        matches!(self, ValidationMode::NonZero | ValidationMode::PartialZero | ValidationMode::AlwaysZero)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Dataset,
    DatasetPriority,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputMode::Dataset => "dataset",
            InputMode::DatasetPriority => "dataset_priority",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Plus,
    Minus,
}

/// `source as alias`. Rule expressions refer to the alias when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVariable {
    pub source: String,
    pub alias: Option<String>,
}

impl RuleVariable {
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatapointRule {
    pub id: String,
    pub antecedent: Option<Expr>,
    pub consequent: Expr,
    pub error_code: Option<String>,
    pub error_level: Option<i64>,
}

/// A `define datapoint ruleset`. Rule expressions stay uncompiled until the
/// ruleset is applied, because their types depend on the target dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPointRuleset {
    pub name: String,
    pub kind: RulesetKind,
    pub variables: Vec<RuleVariable>,
    pub rules: Vec<DatapointRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyItem {
    pub sign: Sign,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalRule {
    pub id: String,
    pub lhs: String,
    pub op: BinaryOp,
    pub rhs: Vec<HierarchyItem>,
    pub error_code: Option<String>,
    pub error_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalRuleset {
    pub name: String,
    pub kind: RulesetKind,
    pub rule_variable: Option<String>,
    pub rules: Vec<HierarchicalRule>,
}

/// The positional id of the `index`-th (0-based) rule of a ruleset.
pub fn positional_rule_id(ruleset: &str, index: usize) -> String {
    format!("{}_{}", ruleset, index + 1)
}

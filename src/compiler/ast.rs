//! The syntax tree handed to the compiler by an external parser.
//!
//! Every node carries the source position used in compile errors. The
//! builder functions at the bottom produce unpositioned nodes and are the
//! usual way hosts and tests assemble trees.
use crate::computation::analytic::{AnalyticFunction, OrderItem, WindowSpec};
pub use crate::computation::set::SetOp;
use crate::expression::{BinaryOp, UnaryOp};
use crate::model::{Role, ScalarType, Value};
use crate::validation::{InputMode, OutputMode, RulesetKind, Sign, ValidationMode};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self { Self { line, column } }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

// --- Statements ---

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `target := expression` (or `<-` for persistent assignment).
    Assignment { target: String, expression: Expr, pos: Position },
    DefineDatapointRuleset(DatapointRulesetDef),
    DefineHierarchicalRuleset(HierarchicalRulesetDef),
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Assignment { pos, .. } => *pos,
            Statement::DefineDatapointRuleset(def) => def.pos,
            Statement::DefineHierarchicalRuleset(def) => def.pos,
        }
    }

    /// The name the statement binds.
    pub fn target(&self) -> &str {
        match self {
            Statement::Assignment { target, .. } => target,
            Statement::DefineDatapointRuleset(def) => &def.name,
            Statement::DefineHierarchicalRuleset(def) => &def.name,
        }
    }
}

/// A ruleset signature element: `source [as alias]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleVariableDef {
    pub source: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatapointRuleDef {
    pub name: Option<String>,
    pub antecedent: Option<Expr>,
    pub consequent: Expr,
    pub error_code: Option<String>,
    pub error_level: Option<i64>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatapointRulesetDef {
    pub name: String,
    pub kind: RulesetKind,
    pub variables: Vec<RuleVariableDef>,
    pub rules: Vec<DatapointRuleDef>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalRuleDef {
    pub name: Option<String>,
    pub lhs: String,
    pub op: BinaryOp,
    pub rhs: Vec<(Sign, String)>,
    pub error_code: Option<String>,
    pub error_level: Option<i64>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalRulesetDef {
    pub name: String,
    pub kind: RulesetKind,
    /// The rule variable (or value domain) the codes belong to.
    pub rule_variable: Option<String>,
    pub rules: Vec<HierarchicalRuleDef>,
    pub pos: Position,
}

// --- Expressions ---

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self { Self { kind, pos: Position::default() } }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.pos = Position::new(line, column);
        self
    }
}

/// The built-in function grammar. Dispatch over it is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Length,
    Upper,
    Lower,
    Trim,
    Ltrim,
    Rtrim,
    Substr,
    Replace,
    Instr,
    MatchCharacters,
    Abs,
    Ceil,
    Floor,
    Round,
    Trunc,
    Sqrt,
    Exp,
    Ln,
    Log,
    Power,
    Mod,
    IsNull,
    Nvl,
    Between,
    CurrentDate,
    Levenshtein,
    PeriodIndicator,
    FillTimeSeries,
    FlowToStock,
    StockToFlow,
    Timeshift,
    TimeAgg,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::Upper => "upper",
            Function::Lower => "lower",
            Function::Trim => "trim",
            Function::Ltrim => "ltrim",
            Function::Rtrim => "rtrim",
            Function::Substr => "substr",
            Function::Replace => "replace",
            Function::Instr => "instr",
            Function::MatchCharacters => "match_characters",
            Function::Abs => "abs",
            Function::Ceil => "ceil",
            Function::Floor => "floor",
            Function::Round => "round",
            Function::Trunc => "trunc",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Power => "power",
            Function::Mod => "mod",
            Function::IsNull => "isnull",
            Function::Nvl => "nvl",
            Function::Between => "between",
            Function::CurrentDate => "current_date",
            Function::Levenshtein => "levenshtein",
            Function::PeriodIndicator => "period_indicator",
            Function::FillTimeSeries => "fill_time_series",
            Function::FlowToStock => "flow_to_stock",
            Function::StockToFlow => "stock_to_flow",
            Function::Timeshift => "timeshift",
            Function::TimeAgg => "time_agg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalcItem {
    pub name: String,
    pub role: Option<Role>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Filter(Box<Expr>),
    Calc(Vec<CalcItem>),
    Keep(Vec<String>),
    Drop(Vec<String>),
    Rename(Vec<(String, String)>),
}

/// `over (partition by ... order by ... window)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Over {
    pub partition_by: Vec<String>,
    pub order_by: Vec<OrderItem>,
    pub window: Option<WindowSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Identifier(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    IfThenElse { condition: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Cast { operand: Box<Expr>, target: ScalarType },
    Call { function: Function, args: Vec<Expr> },
    In { operand: Box<Expr>, set: Vec<Value>, negated: bool },
    /// `ds#component`
    Membership { dataset: Box<Expr>, component: String },
    Clause { dataset: Box<Expr>, clause: Clause },
    SetOp { op: SetOp, operands: Vec<Expr> },
    Analytic { function: AnalyticFunction, operand: Box<Expr>, over: Over },
    CheckDatapoint { dataset: Box<Expr>, ruleset: String, components: Vec<String>, mode: OutputMode },
    Check {
        condition: Box<Expr>,
        error_code: Option<Box<Expr>>,
        error_level: Option<Box<Expr>>,
        imbalance: Option<Box<Expr>>,
        invalid: bool,
    },
    CheckHierarchy {
        dataset: Box<Expr>,
        ruleset: String,
        rule_component: Option<String>,
        validation_mode: ValidationMode,
        input_mode: InputMode,
        output: OutputMode,
    },
}

// --- Builders ---

pub fn assign(target: &str, expression: Expr) -> Statement {
    Statement::Assignment { target: target.to_string(), expression, pos: Position::default() }
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::new(ExprKind::Literal(value.into()))
}

pub fn null() -> Expr {
    Expr::new(ExprKind::Literal(Value::Null))
}

pub fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Identifier(name.to_string()))
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::new(ExprKind::Unary { op, operand: Box::new(operand) })
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) })
}

pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::new(ExprKind::IfThenElse { condition: Box::new(condition), then: Box::new(then), otherwise: Box::new(otherwise) })
}

pub fn cast(operand: Expr, target: ScalarType) -> Expr {
    Expr::new(ExprKind::Cast { operand: Box::new(operand), target })
}

pub fn call(function: Function, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call { function, args })
}

pub fn in_set(operand: Expr, set: Vec<Value>, negated: bool) -> Expr {
    Expr::new(ExprKind::In { operand: Box::new(operand), set, negated })
}

pub fn membership(dataset: Expr, component: &str) -> Expr {
    Expr::new(ExprKind::Membership { dataset: Box::new(dataset), component: component.to_string() })
}

pub fn clause(dataset: Expr, clause: Clause) -> Expr {
    Expr::new(ExprKind::Clause { dataset: Box::new(dataset), clause })
}

pub fn filter(dataset: Expr, predicate: Expr) -> Expr {
    clause(dataset, Clause::Filter(Box::new(predicate)))
}

pub fn calc(dataset: Expr, items: Vec<(&str, Option<Role>, Expr)>) -> Expr {
    let items = items
        .into_iter()
        .map(|(name, role, expr)| CalcItem { name: name.to_string(), role, expr })
        .collect();
    clause(dataset, Clause::Calc(items))
}

pub fn keep(dataset: Expr, names: &[&str]) -> Expr {
    clause(dataset, Clause::Keep(names.iter().map(|s| s.to_string()).collect()))
}

pub fn drop(dataset: Expr, names: &[&str]) -> Expr {
    clause(dataset, Clause::Drop(names.iter().map(|s| s.to_string()).collect()))
}

pub fn rename(dataset: Expr, pairs: &[(&str, &str)]) -> Expr {
    clause(dataset, Clause::Rename(pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()))
}

pub fn set_op(op: SetOp, operands: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::SetOp { op, operands })
}

pub fn analytic(function: AnalyticFunction, operand: Expr, over: Over) -> Expr {
    Expr::new(ExprKind::Analytic { function, operand: Box::new(operand), over })
}

pub fn check_datapoint(dataset: Expr, ruleset: &str, mode: OutputMode) -> Expr {
    Expr::new(ExprKind::CheckDatapoint { dataset: Box::new(dataset), ruleset: ruleset.to_string(), components: Vec::new(), mode })
}

pub fn check(condition: Expr, error_code: Option<Expr>, error_level: Option<Expr>, imbalance: Option<Expr>, invalid: bool) -> Expr {
    Expr::new(ExprKind::Check {
        condition: Box::new(condition),
        error_code: error_code.map(Box::new),
        error_level: error_level.map(Box::new),
        imbalance: imbalance.map(Box::new),
        invalid,
    })
}

pub fn check_hierarchy(
    dataset: Expr,
    ruleset: &str,
    rule_component: Option<&str>,
    validation_mode: ValidationMode,
    output: OutputMode,
) -> Expr {
    Expr::new(ExprKind::CheckHierarchy {
        dataset: Box::new(dataset),
        ruleset: ruleset.to_string(),
        rule_component: rule_component.map(str::to_string),
        validation_mode,
        input_mode: InputMode::Dataset,
        output,
    })
}

/// A datapoint rule with an optional name.
pub fn dp_rule(name: Option<&str>, consequent: Expr, error_code: Option<&str>, error_level: Option<i64>) -> DatapointRuleDef {
    DatapointRuleDef {
        name: name.map(str::to_string),
        antecedent: None,
        consequent,
        error_code: error_code.map(str::to_string),
        error_level,
        pos: Position::default(),
    }
}

/// A hierarchical rule `lhs op ±rhs...`.
pub fn hr_rule(name: Option<&str>, lhs: &str, op: BinaryOp, rhs: &[(Sign, &str)]) -> HierarchicalRuleDef {
    HierarchicalRuleDef {
        name: name.map(str::to_string),
        lhs: lhs.to_string(),
        op,
        rhs: rhs.iter().map(|(s, c)| (*s, c.to_string())).collect(),
        error_code: None,
        error_level: None,
        pos: Position::default(),
    }
}

impl DatapointRuleDef {
    pub fn when(mut self, antecedent: Expr) -> Self {
        self.antecedent = Some(antecedent);
        self
    }
}

impl HierarchicalRuleDef {
    pub fn with_errors(mut self, error_code: Option<&str>, error_level: Option<i64>) -> Self {
        self.error_code = error_code.map(str::to_string);
        self.error_level = error_level;
        self
    }
}

/// `define datapoint ruleset name (variable v1 as a, ...) is ... end datapoint ruleset`.
pub fn define_datapoint_ruleset(
    name: &str,
    kind: RulesetKind,
    variables: &[(&str, Option<&str>)],
    rules: Vec<DatapointRuleDef>,
) -> Statement {
    Statement::DefineDatapointRuleset(DatapointRulesetDef {
        name: name.to_string(),
        kind,
        variables: variables
            .iter()
            .map(|(source, alias)| RuleVariableDef { source: source.to_string(), alias: alias.map(str::to_string) })
            .collect(),
        rules,
        pos: Position::default(),
    })
}

pub fn define_hierarchical_ruleset(
    name: &str,
    kind: RulesetKind,
    rule_variable: Option<&str>,
    rules: Vec<HierarchicalRuleDef>,
) -> Statement {
    Statement::DefineHierarchicalRuleset(HierarchicalRulesetDef {
        name: name.to_string(),
        kind,
        rule_variable: rule_variable.map(str::to_string),
        rules,
        pos: Position::default(),
    })
}

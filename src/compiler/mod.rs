//! Compiles syntax trees into typed expressions.
//!
//! Identifiers resolve against the innermost component frame (inside a
//! clause or a rule) and then against the evaluation context. Every node is
//! type-checked as it is built, so a statement fails before any data is read.
pub mod ast;
mod clauses;
pub mod error;
mod functions;
mod rulesets;

pub use error::{CompileError, CompileErrorKind};

use crate::computation::transform::{self, MapOperand, MeasureMap, MeasureOutput};
use crate::computation::{set, Binding, ComputationError, EvaluationContext, ProcessingEngine};
use crate::expression::cast::cast_operation;
use crate::expression::operators::{binary, in_set, unary};
use crate::expression::{BinaryOp, DatasetExpression, EmptyScope, Expression, Operation, ScalarExpression};
use crate::model::{Component, DataStructure, ScalarType, Value};
use crate::type_system::checker::expect;
use crate::type_system::rules::arithmetic::unify_all;
use crate::type_system::rules::cast::check_cast;
use crate::validation::{DataPointRuleset, HierarchicalRuleset, BOOL_VAR};
use ast::{Expr, ExprKind, Position, Statement};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

/// What one statement compiles to.
#[derive(Debug, Clone)]
pub enum Compiled {
    Expression(Expression),
    DatapointRuleset(DataPointRuleset),
    HierarchicalRuleset(HierarchicalRuleset),
}

/// Names visible as row values: visible name → (component name, type).
#[derive(Debug, Clone)]
struct Frame {
    names: IndexMap<String, (String, ScalarType)>,
}

impl Frame {
    fn of(structure: &DataStructure) -> Self {
        let names = structure
            .components()
            .map(|c| (c.name.clone(), (c.name.clone(), c.value_type)))
            .collect();
        Self { names }
    }
}

pub struct Compiler<'a> {
    context: &'a EvaluationContext,
    engine: Arc<dyn ProcessingEngine>,
    frames: Vec<Frame>,
}

impl<'a> Compiler<'a> {
    pub fn new(context: &'a EvaluationContext, engine: Arc<dyn ProcessingEngine>) -> Self {
        Self { context, engine, frames: Vec::new() }
    }

    pub fn compile_statement(&mut self, statement: &Statement) -> Result<Compiled, CompileError> {
        match statement {
            Statement::Assignment { expression, .. } => Ok(Compiled::Expression(self.compile(expression)?)),
            Statement::DefineDatapointRuleset(def) => Ok(Compiled::DatapointRuleset(rulesets::define_datapoint(def)?)),
            Statement::DefineHierarchicalRuleset(def) => {
                Ok(Compiled::HierarchicalRuleset(rulesets::define_hierarchical(def)?))
            }
        }
    }

    pub fn compile(&mut self, expr: &Expr) -> Result<Expression, CompileError> {
        let pos = expr.pos;
        let compiled = match &expr.kind {
            ExprKind::Literal(value) => Expression::Scalar(ScalarExpression::literal(value.clone())),
            ExprKind::Identifier(name) => self.identifier(name, pos)?,
            ExprKind::Unary { op, operand } => {
                let operand = self.compile(operand)?;
                let op = *op;
                self.lift(vec![operand], pos, move |t: &[Option<ScalarType>]| Ok(unary(op, t[0])?))?
            }
            ExprKind::Binary { op, left, right } => {
                let (l, r) = (self.compile(left)?, self.compile(right)?);
                self.binary(*op, l, r, pos)?
            }
            ExprKind::IfThenElse { condition, then, otherwise } => {
                let condition = self.scalar(condition)?;
                let (then, otherwise) = (self.scalar(then)?, self.scalar(otherwise)?);
                Expression::Scalar(conditional(condition, then, otherwise).map_err(|kind| CompileError::new(pos, kind))?)
            }
            ExprKind::Cast { operand, target } => {
                let operand = self.compile(operand)?;
                let target = *target;
                self.lift(vec![operand], pos, move |t: &[Option<ScalarType>]| {
                    check_cast(t[0], target)?;
                    Ok(cast_operation(target))
                })?
            }
            ExprKind::Call { function, args } => self.call(*function, args, pos)?,
            ExprKind::In { operand, set, negated } => {
                let operand = self.compile(operand)?;
                let negated = *negated;
                self.lift(vec![operand], pos, |t: &[Option<ScalarType>]| Ok(in_set(t[0], set, negated)?))?
            }
            ExprKind::Membership { dataset, component } => self.membership(dataset, component, pos)?,
            ExprKind::Clause { dataset, clause } => self.clause(dataset, clause, pos)?,
            ExprKind::SetOp { op, operands } => self.set_op(*op, operands, pos)?,
            ExprKind::Analytic { function, operand, over } => self.analytic(*function, operand, over, pos)?,
            ExprKind::CheckDatapoint { dataset, ruleset, components, mode } => {
                self.check_datapoint(dataset, ruleset, components, *mode, pos)?
            }
            ExprKind::Check { condition, error_code, error_level, imbalance, invalid } => self.check(
                condition,
                error_code.as_deref(),
                error_level.as_deref(),
                imbalance.as_deref(),
                *invalid,
                pos,
            )?,
            ExprKind::CheckHierarchy { dataset, ruleset, rule_component, validation_mode, input_mode, output } => self
                .check_hierarchy(dataset, ruleset, rule_component.as_deref(), *validation_mode, *input_mode, *output, pos)?,
        };
        Ok(self.fold(compiled))
    }

    /// Compiles a node that must be scalar.
    fn scalar(&mut self, expr: &Expr) -> Result<ScalarExpression, CompileError> {
        match self.compile(expr)? {
            Expression::Scalar(s) => Ok(s),
            Expression::Dataset(_) => {
                Err(CompileError::new(expr.pos, CompileErrorKind::ExpressionKind { expected: "scalar", found: "dataset" }))
            }
        }
    }

    /// Compiles a node that must be a dataset.
    fn dataset(&mut self, expr: &Expr) -> Result<DatasetExpression, CompileError> {
        match self.compile(expr)? {
            Expression::Dataset(d) => Ok(d),
            Expression::Scalar(_) => {
                Err(CompileError::new(expr.pos, CompileErrorKind::ExpressionKind { expected: "dataset", found: "scalar" }))
            }
        }
    }

    /// Runs `f` with `frame` as the innermost component scope.
    fn within<T>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> Result<T, CompileError>) -> Result<T, CompileError> {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    fn fold(&self, expression: Expression) -> Expression {
        match expression {
            Expression::Scalar(s) if self.engine.config().fold_constants && s.is_constant() && !s.is_volatile() => {
                // A failing fold (such as `1 / 0`) is left to fail at execution.
                Expression::Scalar(s.clone().fold().unwrap_or(s))
            }
            other => other,
        }
    }

    fn identifier(&self, name: &str, pos: Position) -> Result<Expression, CompileError> {
        if let Some((component, ty)) = self.frames.last().and_then(|f| f.names.get(name)) {
            return Ok(Expression::Scalar(ScalarExpression::variable(component.clone(), *ty)));
        }
        match self.context.get(name) {
            Some(Binding::Scalar { ty, value }) => Ok(Expression::Scalar(ScalarExpression::typed_literal(value.clone(), *ty))),
            Some(Binding::Dataset(ds)) => Ok(Expression::Dataset(DatasetExpression::variable(name, ds.structure_arc()))),
            Some(other) => Err(CompileError::new(
                pos,
                CompileErrorKind::BindingKind { name: name.to_string(), expected: "value", found: other.kind() },
            )),
            None => Err(CompileError::new(pos, CompileErrorKind::UnresolvedIdentifier(name.to_string()))),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Expression, right: Expression, pos: Position) -> Result<Expression, CompileError> {
        if let (BinaryOp::And | BinaryOp::Or, Expression::Scalar(l), Expression::Scalar(r)) = (op, &left, &right) {
            binary(op, l.ty(), r.ty()).map_err(|e| CompileError::new(pos, e))?;
            let (l, r) = (l.clone(), r.clone());
            let combined = if op == BinaryOp::And { ScalarExpression::and(l, r) } else { ScalarExpression::or(l, r) };
            return Ok(Expression::Scalar(combined));
        }
        self.lift(vec![left, right], pos, move |t: &[Option<ScalarType>]| Ok(binary(op, t[0], t[1])?))
    }

    fn membership(&mut self, dataset: &Expr, component: &str, pos: Position) -> Result<Expression, CompileError> {
        let source = self.dataset(dataset)?;
        let found = source.structure().get(component).ok_or_else(|| {
            CompileError::new(
                pos,
                CompileErrorKind::UnknownComponent { component: component.to_string(), dataset: source.name().to_string() },
            )
        })?;
        if found.is_identifier() {
            return Err(CompileError::new(pos, CompileErrorKind::invalid_argument("#", "identifiers cannot be selected")));
        }
        let names = vec![component.to_string()];
        let out = transform::project_structure(source.structure(), &names, true).map_err(|e| CompileError::new(pos, e))?;
        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| engine.execute_project(&source.resolve(ctx)?, &names, true)),
        )))
    }

    fn set_op(&mut self, op: set::SetOp, operands: &[Expr], pos: Position) -> Result<Expression, CompileError> {
        let (min, max) = op.arity();
        if !(min..=max).contains(&operands.len()) {
            let expected = if min == max { min.to_string() } else { format!("at least {}", min) };
            return Err(CompileError::new(
                pos,
                CompileErrorKind::Arity { operator: op.name().to_string(), expected, found: operands.len() },
            ));
        }
        let operands = operands.iter().map(|e| self.dataset(e)).collect::<Result<Vec<_>, _>>()?;
        let structure = operands[0].structure_arc();
        if let Some(other) = operands.iter().find(|d| !set::compatible(&structure, d.structure())) {
            return Err(CompileError::new(
                pos,
                CompileErrorKind::invalid_argument(op.name(), format!("{} does not share the structure of {}", other.name(), operands[0].name())),
            ));
        }
        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            structure,
            Arc::new(move |ctx: &EvaluationContext| {
                let resolved = operands.iter().map(|d| d.resolve(ctx)).collect::<Result<Vec<_>, _>>()?;
                engine.execute_set(op, &resolved)
            }),
        )))
    }

    /// Builds a scalar operation over scalar operands, or maps it over the
    /// measures of the dataset operands.
    ///
    /// Dataset operands must share their identifiers and are combined on the
    /// measures they all carry. A boolean result over a single non-boolean
    /// measure is named `bool_var`.
    fn lift<F>(&self, operands: Vec<Expression>, pos: Position, build: F) -> Result<Expression, CompileError>
    where
        F: Fn(&[Option<ScalarType>]) -> Result<Operation, CompileErrorKind>,
    {
        let fail = |kind: CompileErrorKind| CompileError::new(pos, kind);
        let datasets: Vec<&DatasetExpression> = operands.iter().filter_map(Expression::as_dataset).collect();
        let Some(first) = datasets.first() else {
            let types: Vec<Option<ScalarType>> = operands.iter().filter_map(Expression::as_scalar).map(|s| s.ty()).collect();
            let op = build(&types).map_err(fail)?;
            let args = operands.into_iter().filter_map(|o| o.as_scalar().cloned()).collect();
            return Ok(Expression::Scalar(ScalarExpression::apply(&op, args)));
        };

        // 1. Identifiers must match across dataset operands.
        let identifiers: Vec<Component> = first.structure().identifiers().cloned().collect();
        let mut id_names = first.structure().identifier_names();
        id_names.sort();
        for other in &datasets[1..] {
            let mut names = other.structure().identifier_names();
            names.sort();
            if names != id_names {
                return Err(fail(CompileErrorKind::invalid_argument(
                    "dataset operation",
                    format!("{} and {} have different identifiers", first.name(), other.name()),
                )));
            }
        }

        // 2. Measures common to every dataset operand, in the first operand's order.
        let measures: Vec<&Component> = first
            .structure()
            .measures()
            .filter(|m| datasets.iter().all(|d| d.structure().get(&m.name).map_or(false, |c| c.is_measure())))
            .collect();
        if measures.is_empty() {
            return Err(fail(CompileErrorKind::invalid_argument("dataset operation", "operands share no measure")));
        }

        // 3. One operation per measure.
        let mut outputs = Vec::with_capacity(measures.len());
        for measure in &measures {
            let mut types = Vec::with_capacity(operands.len());
            let mut sources = Vec::with_capacity(operands.len());
            for operand in &operands {
                match operand {
                    Expression::Dataset(d) => {
                        types.push(d.structure().get(&measure.name).map(|c| c.value_type));
                        sources.push(Some(measure.name.clone()));
                    }
                    Expression::Scalar(s) => {
                        types.push(s.ty());
                        sources.push(None);
                    }
                }
            }
            let operation = build(&types).map_err(fail)?;
            let renamed = measures.len() == 1 && operation.result == ScalarType::Boolean && measure.value_type != ScalarType::Boolean;
            let name = if renamed { BOOL_VAR.to_string() } else { measure.name.clone() };
            outputs.push(MeasureOutput { name, operation, sources });
        }
        let map = MeasureMap { identifiers, outputs };
        let out = map.structure().map_err(|e| fail(ComputationError::from(e).into()))?;
        trace!(operands = operands.len(), measures = map.outputs.len(), "lifted over measures");

        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| {
                let resolved = operands
                    .iter()
                    .map(|o| match o {
                        Expression::Dataset(d) => d.resolve(ctx).map(MapOperand::Dataset),
                        Expression::Scalar(s) => s.resolve(ctx).map(MapOperand::Scalar),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                engine.execute_measure_map(&resolved, &map)
            }),
        )))
    }

    /// The value of a constant scalar operand, used where an argument must
    /// be known at compile time.
    fn constant_value(expression: &Expression) -> Option<Value> {
        match expression {
            Expression::Scalar(s) if s.is_constant() && !s.is_volatile() => s.resolve(&EmptyScope).ok(),
            _ => None,
        }
    }
}

/// `if-then-else` over scalars. Integer and number branches unify to number.
fn conditional(
    condition: ScalarExpression,
    then: ScalarExpression,
    otherwise: ScalarExpression,
) -> Result<ScalarExpression, CompileErrorKind> {
    expect("if-then-else", condition.ty(), ScalarType::Boolean)?;
    let ty = unify_all("if-then-else", &[then.ty(), otherwise.ty()])?;
    let widen = |branch: ScalarExpression| match (ty, branch.ty()) {
        (Some(ScalarType::Number), Some(ScalarType::Integer)) => {
            ScalarExpression::apply(&cast_operation(ScalarType::Number), vec![branch])
        }
        _ => branch,
    };
    Ok(ScalarExpression::conditional(condition, widen(then), widen(otherwise), ty))
}

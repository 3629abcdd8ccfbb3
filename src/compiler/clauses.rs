//! Dataset clauses (`filter`, `calc`, `keep`, `drop`, `rename`) and analytic calls.
use super::ast::{CalcItem, Clause, Expr, ExprKind, Over, Position};
use super::{CompileError, CompileErrorKind, Compiler, Frame};
use crate::computation::analytic::{AnalyticCall, AnalyticFunction, WindowSpec};
use crate::computation::transform::{self, CalcColumn};
use crate::computation::EvaluationContext;
use crate::expression::{DatasetExpression, Expression, ScalarExpression};
use crate::model::{DataStructure, Role, ScalarType};
use crate::type_system::checker::{expect, expect_numeric};
use std::sync::Arc;

/// Prefix of the scratch columns holding analytic results inside `calc`.
const ANALYTIC_SCRATCH: &str = "$analytic_";

impl Compiler<'_> {
    pub(super) fn clause(&mut self, dataset: &Expr, clause: &Clause, pos: Position) -> Result<Expression, CompileError> {
        let source = self.dataset(dataset)?;
        let fail = |kind: CompileErrorKind| CompileError::new(pos, kind);
        let engine = Arc::clone(&self.engine);
        let compiled = match clause {
            Clause::Filter(predicate) => {
                let condition = self.within(Frame::of(source.structure()), |c| c.scalar(predicate))?;
                expect("filter", condition.ty(), ScalarType::Boolean).map_err(|e| CompileError::new(predicate.pos, e))?;
                DatasetExpression::new(
                    source.structure_arc(),
                    Arc::new(move |ctx: &EvaluationContext| engine.execute_filter(&source.resolve(ctx)?, &condition, ctx)),
                )
            }
            Clause::Calc(items) => return self.calc(source, items, pos),
            Clause::Keep(names) | Clause::Drop(names) => {
                let keep = matches!(clause, Clause::Keep(_));
                self.require_components(&source, names, pos)?;
                let out = transform::project_structure(source.structure(), names, keep).map_err(|e| fail(e.into()))?;
                let names = names.clone();
                DatasetExpression::new(
                    out,
                    Arc::new(move |ctx: &EvaluationContext| engine.execute_project(&source.resolve(ctx)?, &names, keep)),
                )
            }
            Clause::Rename(pairs) => {
                let from: Vec<String> = pairs.iter().map(|(f, _)| f.clone()).collect();
                self.require_components(&source, &from, pos)?;
                let out = transform::rename_structure(source.structure(), pairs).map_err(|e| fail(e.into()))?;
                let pairs = pairs.clone();
                DatasetExpression::new(
                    out,
                    Arc::new(move |ctx: &EvaluationContext| engine.execute_rename(&source.resolve(ctx)?, &pairs)),
                )
            }
        };
        Ok(Expression::Dataset(compiled))
    }

    /// `calc`: analytic items are computed first into scratch columns, then
    /// every item is assigned, then the scratch columns are dropped.
    fn calc(&mut self, source: DatasetExpression, items: &[CalcItem], pos: Position) -> Result<Expression, CompileError> {
        let fail = |kind: CompileErrorKind| CompileError::new(pos, kind);
        let input = source.structure_arc();
        let mut calls = Vec::new();
        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            if let Some(existing) = input.get(&item.name) {
                if existing.is_identifier() {
                    return Err(CompileError::new(
                        item.expr.pos,
                        CompileErrorKind::invalid_argument("calc", format!("identifier {} cannot be overwritten", item.name)),
                    ));
                }
            }
            let role = item.role.or_else(|| input.get(&item.name).map(|c| c.role)).unwrap_or(Role::Measure);
            let expression = match &item.expr.kind {
                ExprKind::Analytic { function, operand, over } => {
                    let ExprKind::Identifier(component) = &operand.kind else {
                        return Err(CompileError::new(
                            operand.pos,
                            CompileErrorKind::invalid_argument(function.name(), "operand must be a component"),
                        ));
                    };
                    let scratch = format!("{}{}", ANALYTIC_SCRATCH, calls.len());
                    let call = self.analytic_call(*function, component, &scratch, over, &input, source.name(), item.expr.pos)?;
                    let measure_type = input.get(component).map_or(ScalarType::Number, |c| c.value_type);
                    let ty = call.function.result_type(measure_type);
                    calls.push(call);
                    ScalarExpression::variable(scratch, ty)
                }
                _ => self.within(Frame::of(&input), |c| c.scalar(&item.expr))?,
            };
            columns.push(CalcColumn { name: item.name.clone(), role, expression });
        }

        // Structures at compile time: scratch, assigned, scratch dropped.
        let scratch_names: Vec<String> = calls.iter().map(|c| c.target.clone()).collect();
        let staged = transform::analytic_structure(&input, &calls).map_err(|e| fail(e.into()))?;
        let shape: Vec<_> = columns.iter().map(|c| (c.name.clone(), c.role, c.expression.component_type())).collect();
        let assigned = transform::calc_structure(&staged, &shape).map_err(|e| fail(e.into()))?;
        let out = transform::project_structure(&assigned, &scratch_names, false).map_err(|e| fail(e.into()))?;

        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| {
                let mut ds = source.resolve(ctx)?;
                if !calls.is_empty() {
                    ds = engine.execute_analytic(&ds, &calls)?;
                }
                ds = engine.execute_calc(&ds, &columns, ctx)?;
                if !scratch_names.is_empty() {
                    ds = engine.execute_project(&ds, &scratch_names, false)?;
                }
                Ok(ds)
            }),
        )))
    }

    /// `f(DS over (...))`: the function is applied to every measure. Attributes
    /// are not carried into the result.
    pub(super) fn analytic(
        &mut self,
        function: AnalyticFunction,
        operand: &Expr,
        over: &Over,
        pos: Position,
    ) -> Result<Expression, CompileError> {
        let source = match self.compile(operand)? {
            Expression::Dataset(d) => d,
            Expression::Scalar(_) => {
                return Err(CompileError::new(
                    pos,
                    CompileErrorKind::invalid_argument(function.name(), "component operands are only allowed inside calc"),
                ))
            }
        };
        let input = source.structure_arc();
        let calls = input
            .measures()
            .map(|m| self.analytic_call(function, &m.name, &m.name, over, &input, source.name(), pos))
            .collect::<Result<Vec<_>, _>>()?;
        let attributes: Vec<String> = input.components().filter(|c| c.role == Role::Attribute).map(|c| c.name.clone()).collect();
        let staged = transform::analytic_structure(&input, &calls).map_err(|e| CompileError::new(pos, e))?;
        let out = transform::project_structure(&staged, &attributes, false).map_err(|e| CompileError::new(pos, e))?;

        let engine = Arc::clone(&self.engine);
        Ok(Expression::Dataset(DatasetExpression::new(
            out,
            Arc::new(move |ctx: &EvaluationContext| {
                let ds = engine.execute_analytic(&source.resolve(ctx)?, &calls)?;
                if attributes.is_empty() {
                    return Ok(ds);
                }
                engine.execute_project(&ds, &attributes, false)
            }),
        )))
    }

    /// Validates one analytic invocation against the input structure.
    #[allow(clippy::too_many_arguments)]
    fn analytic_call(
        &self,
        function: AnalyticFunction,
        source: &str,
        target: &str,
        over: &Over,
        structure: &DataStructure,
        dataset: &str,
        pos: Position,
    ) -> Result<AnalyticCall, CompileError> {
        let fail = |kind: CompileErrorKind| CompileError::new(pos, kind);
        let unknown = |name: &str| fail(CompileErrorKind::UnknownComponent { component: name.to_string(), dataset: dataset.to_string() });
        if !function.is_implemented() {
            return Err(fail(CompileErrorKind::NotImplemented(function.name().to_string())));
        }
        let measure = structure.get(source).ok_or_else(|| unknown(source))?;
        if function.requires_numeric() {
            expect_numeric(function.name(), Some(measure.value_type)).map_err(|e| fail(e.into()))?;
        }
        for name in over.partition_by.iter().chain(over.order_by.iter().map(|o| &o.component)) {
            if !structure.contains(name) {
                return Err(unknown(name));
            }
        }
        if let Some(WindowSpec::Range { .. }) = over.window {
            let numeric_key = match over.order_by.as_slice() {
                [only] => structure.get(&only.component).map_or(false, |c| c.value_type.is_numeric()),
                _ => false,
            };
            if !numeric_key {
                return Err(fail(CompileErrorKind::invalid_argument(
                    function.name(),
                    "a range window requires exactly one numeric order by component",
                )));
            }
        }
        Ok(AnalyticCall {
            function,
            source: source.to_string(),
            target: target.to_string(),
            partition_by: over.partition_by.clone(),
            order_by: over.order_by.clone(),
            window: over.window,
        })
    }

    fn require_components(&self, source: &DatasetExpression, names: &[String], pos: Position) -> Result<(), CompileError> {
        match names.iter().find(|n| !source.structure().contains(n)) {
            Some(missing) => Err(CompileError::new(
                pos,
                CompileErrorKind::UnknownComponent { component: missing.clone(), dataset: source.name().to_string() },
            )),
            None => Ok(()),
        }
    }
}

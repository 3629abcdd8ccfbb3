//! The in-memory reference engine.
use super::analytic::AnalyticCall;
use super::context::EvaluationContext;
use super::error::ComputationError;
use super::executor::RowExecutor;
use super::set::{self, SetOp};
use super::transform::{self, CalcColumn, MapOperand, MeasureMap};
use super::ProcessingEngine;
use crate::config::EngineConfig;
use crate::expression::ScalarExpression;
use crate::model::{Dataset, Role};
use crate::validation::datapoint::{self, BoundDatapointRuleset};
use crate::validation::hierarchy::{self, HierarchyOptions, HierarchyTarget};
use crate::validation::simple::{self, CheckOperands};
use crate::validation::{HierarchicalRuleset, OutputMode, ValidationMode};
use std::sync::Arc;
use tracing::debug;

/// Materialises every result. Row evaluation is sequential or spread over
/// the rayon pool, depending on the executor.
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    config: EngineConfig,
    executor: RowExecutor,
}

impl InMemoryEngine {
    pub fn new(config: EngineConfig, executor: RowExecutor) -> Self {
        Self { config, executor }
    }

    pub fn executor(&self) -> RowExecutor { self.executor }
}

impl Default for InMemoryEngine {
    fn default() -> Self { Self::new(EngineConfig::default(), RowExecutor::Sequential) }
}

impl ProcessingEngine for InMemoryEngine {
    fn name(&self) -> &'static str {
        match self.executor {
            RowExecutor::Sequential => "memory",
            RowExecutor::Parallel => "parallel",
        }
    }

    fn config(&self) -> &EngineConfig { &self.config }

    fn execute_rename(&self, dataset: &Dataset, mapping: &[(String, String)]) -> Result<Dataset, ComputationError> {
        let out = transform::rename_structure(dataset.structure(), mapping)?;
        debug!(renamed = mapping.len(), "rename");
        Ok(dataset.restructured(Arc::new(out)))
    }

    fn execute_project(&self, dataset: &Dataset, names: &[String], keep: bool) -> Result<Dataset, ComputationError> {
        let out = transform::project_structure(dataset.structure(), names, keep)?;
        let rows = transform::project(dataset, &out)?;
        debug!(keep, columns = out.len(), rows = rows.len(), "project");
        Ok(Dataset::from_rows_unchecked(Arc::new(out), rows))
    }

    fn execute_filter(
        &self,
        dataset: &Dataset,
        condition: &ScalarExpression,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError> {
        let rows = transform::filter(dataset, condition, ctx, self.executor)?;
        debug!(rows = rows.len(), "filter");
        Ok(Dataset::from_rows_unchecked(dataset.structure_arc(), rows))
    }

    fn execute_calc(&self, dataset: &Dataset, columns: &[CalcColumn], ctx: &EvaluationContext) -> Result<Dataset, ComputationError> {
        let shape: Vec<_> = columns
            .iter()
            .map(|c| (c.name.clone(), c.role, c.expression.component_type()))
            .collect();
        let out = transform::calc_structure(dataset.structure(), &shape)?;
        let rows = transform::calc(dataset, columns, &out, ctx, self.executor)?;
        debug!(columns = columns.len(), rows = rows.len(), "calc");
        // Identifier uniqueness only needs rechecking when calc adds identifiers.
        if columns.iter().any(|c| c.role == Role::Identifier) {
            return Ok(Dataset::new(out, rows)?);
        }
        Ok(Dataset::from_rows_unchecked(Arc::new(out), rows))
    }

    fn execute_measure_map(&self, operands: &[MapOperand], map: &MeasureMap) -> Result<Dataset, ComputationError> {
        let out = map.structure()?;
        let rows = transform::measure_map(operands, map, self.executor)?;
        debug!(operands = operands.len(), measures = map.outputs.len(), rows = rows.len(), "measure map");
        Ok(Dataset::from_rows_unchecked(Arc::new(out), rows))
    }

    fn execute_set(&self, op: SetOp, operands: &[Dataset]) -> Result<Dataset, ComputationError> {
        let result = set::evaluate(op, operands)?;
        debug!(op = op.name(), operands = operands.len(), rows = result.row_count(), "set operation");
        Ok(result)
    }

    fn execute_analytic(&self, dataset: &Dataset, calls: &[AnalyticCall]) -> Result<Dataset, ComputationError> {
        let out = transform::analytic_structure(dataset.structure(), calls)?;
        let rows = transform::analytic(dataset, calls, &out)?;
        debug!(calls = calls.len(), rows = rows.len(), "analytic");
        Ok(Dataset::from_rows_unchecked(Arc::new(out), rows))
    }

    fn execute_validate_dp_ruleset(
        &self,
        dataset: &Dataset,
        ruleset: &BoundDatapointRuleset,
        mode: OutputMode,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError> {
        let out = Arc::new(datapoint::output_structure(dataset.structure(), ruleset, mode)?);
        datapoint::validate(dataset, ruleset, mode, out, ctx, self.executor)
    }

    fn execute_validation_simple(
        &self,
        operands: CheckOperands<'_>,
        mode: OutputMode,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError> {
        let imbalance_type = match operands.imbalance {
            Some(ds) => Some(simple::sole_measure(ds.structure(), "imbalance", |t| t.is_numeric(), "numeric")?.value_type),
            None => None,
        };
        let out = Arc::new(simple::output_structure(operands.condition.structure(), imbalance_type)?);
        simple::validate(operands, mode, out, ctx, self.executor)
    }

    fn execute_check_hierarchy(
        &self,
        dataset: &Dataset,
        ruleset: &HierarchicalRuleset,
        target: &HierarchyTarget,
        validation: ValidationMode,
        output: OutputMode,
    ) -> Result<Dataset, ComputationError> {
        let options = HierarchyOptions {
            validation,
            output,
            non_null_policy: self.config.non_null_policy,
            keep_rule_component: self.config.keep_rule_component,
        };
        let out = Arc::new(hierarchy::output_structure(dataset.structure(), target, &options)?);
        hierarchy::validate(dataset, ruleset, target, &options, out)
    }
}

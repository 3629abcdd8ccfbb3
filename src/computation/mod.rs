//! The processing engine contract and its in-memory implementation.
//!
//! Engines execute dataset-shaped operations over resolved operands. Every
//! engine must produce the same logical row sets for identical inputs; row
//! order is unspecified except where analytic ordering defines it.
pub mod analytic;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod kernel;
pub mod set;
pub mod transform;

pub use context::{Binding, EvaluationContext};
pub use engine::InMemoryEngine;
pub use error::ComputationError;
pub use set::SetOp;
pub use transform::{CalcColumn, MapOperand, MeasureMap, MeasureOutput};

use crate::config::EngineConfig;
use crate::expression::ScalarExpression;
use crate::model::Dataset;
use crate::validation::datapoint::BoundDatapointRuleset;
use crate::validation::hierarchy::HierarchyTarget;
use crate::validation::simple::CheckOperands;
use crate::validation::{HierarchicalRuleset, OutputMode, ValidationMode};
use analytic::AnalyticCall;
use executor::RowExecutor;
use std::fmt;
use std::sync::Arc;

/// An execution backend. All operands are already type-checked.
pub trait ProcessingEngine: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn config(&self) -> &EngineConfig;

    /// Fails on a name collision; swapping two names is allowed.
    fn execute_rename(&self, dataset: &Dataset, mapping: &[(String, String)]) -> Result<Dataset, ComputationError>;
    /// `keep` when `keep` is true, otherwise `drop`.
    fn execute_project(&self, dataset: &Dataset, names: &[String], keep: bool) -> Result<Dataset, ComputationError>;
    fn execute_filter(
        &self,
        dataset: &Dataset,
        condition: &ScalarExpression,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError>;
    fn execute_calc(&self, dataset: &Dataset, columns: &[CalcColumn], ctx: &EvaluationContext) -> Result<Dataset, ComputationError>;
    fn execute_measure_map(&self, operands: &[MapOperand], map: &MeasureMap) -> Result<Dataset, ComputationError>;
    fn execute_set(&self, op: SetOp, operands: &[Dataset]) -> Result<Dataset, ComputationError>;
    fn execute_analytic(&self, dataset: &Dataset, calls: &[AnalyticCall]) -> Result<Dataset, ComputationError>;
    fn execute_validate_dp_ruleset(
        &self,
        dataset: &Dataset,
        ruleset: &BoundDatapointRuleset,
        mode: OutputMode,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError>;
    fn execute_validation_simple(
        &self,
        operands: CheckOperands<'_>,
        mode: OutputMode,
        ctx: &EvaluationContext,
    ) -> Result<Dataset, ComputationError>;
    fn execute_check_hierarchy(
        &self,
        dataset: &Dataset,
        ruleset: &HierarchicalRuleset,
        target: &HierarchyTarget,
        validation: ValidationMode,
        output: OutputMode,
    ) -> Result<Dataset, ComputationError>;
}

/// Selects the engine named by the configuration.
pub fn select_engine(config: &EngineConfig) -> Result<Arc<dyn ProcessingEngine>, ComputationError> {
    let executor = match config.engine.as_str() {
        "memory" => RowExecutor::Sequential,
        "parallel" => RowExecutor::Parallel,
        other => return Err(ComputationError::UnknownEngine(other.to_string())),
    };
    Ok(Arc::new(InMemoryEngine::new(config.clone(), executor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_engine_by_name() {
        let mut config = EngineConfig::default();
        assert_eq!(select_engine(&config).unwrap().name(), "memory");
        config.engine = "parallel".into();
        assert_eq!(select_engine(&config).unwrap().name(), "parallel");
        config.engine = "spark".into();
        assert_eq!(select_engine(&config).unwrap_err(), ComputationError::UnknownEngine("spark".into()));
    }
}

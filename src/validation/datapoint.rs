//! Datapoint ruleset validation (`check_datapoint`).
use super::ruleset::OutputMode;
use super::{BOOL_VAR, ERROR_CODE, ERROR_LEVEL, RULE_ID};
use crate::computation::executor::RowExecutor;
use crate::computation::ComputationError;
use crate::expression::{RowScope, ScalarExpression, Scope};
use crate::model::{Component, DataPoint, DataStructure, Dataset, ModelError, ScalarType, Value};
use std::sync::Arc;
use tracing::debug;

/// A rule compiled against the target dataset's structure.
#[derive(Debug, Clone)]
pub struct CompiledDatapointRule {
    pub id: String,
    pub antecedent: Option<ScalarExpression>,
    pub consequent: ScalarExpression,
    pub error_code: Option<String>,
    pub error_level: Option<i64>,
}

/// A datapoint ruleset bound to one dataset.
#[derive(Debug, Clone)]
pub struct BoundDatapointRuleset {
    pub name: String,
    pub rules: Vec<CompiledDatapointRule>,
    /// Dataset measures the ruleset declares as variables, in structure order.
    pub measures: Vec<String>,
}

impl CompiledDatapointRule {
    /// A false or null antecedent makes the rule hold.
    fn evaluate(&self, scope: &dyn Scope) -> Result<Value, ComputationError> {
        if let Some(antecedent) = &self.antecedent {
            if antecedent.resolve(scope)?.as_bool() != Some(true) {
                return Ok(Value::Boolean(true));
            }
        }
        self.consequent.resolve(scope)
    }
}

pub fn output_structure(input: &DataStructure, bound: &BoundDatapointRuleset, mode: OutputMode) -> Result<DataStructure, ModelError> {
    let mut components: Vec<Component> = input.identifiers().cloned().collect();
    components.push(Component::identifier(RULE_ID, ScalarType::String));
    for measure in input.measures() {
        if mode == OutputMode::AllMeasures || bound.measures.contains(&measure.name) {
            components.push(measure.clone());
        }
    }
    if mode != OutputMode::Invalid {
        components.push(Component::measure(BOOL_VAR, ScalarType::Boolean));
    }
    components.push(Component::measure(ERROR_CODE, ScalarType::String));
    components.push(Component::measure(ERROR_LEVEL, ScalarType::Integer));
    DataStructure::new(components)
}

pub fn validate(
    dataset: &Dataset,
    bound: &BoundDatapointRuleset,
    mode: OutputMode,
    out: Arc<DataStructure>,
    outer: &dyn Scope,
    executor: RowExecutor,
) -> Result<Dataset, ComputationError> {
    let structure = dataset.structure();
    let rows = dataset.materialize();
    let ids = structure.identifier_indices();
    let kept: Vec<usize> = structure
        .components()
        .enumerate()
        .filter(|(_, c)| c.is_measure() && out.contains(&c.name))
        .map(|(i, _)| i)
        .collect();

    let output = executor.flat_map(&rows, |point: &DataPoint| {
        let scope = RowScope::new(structure, point, outer);
        let mut emitted = Vec::new();
        for rule in &bound.rules {
            let result = rule.evaluate(&scope)?;
            let failed = result.as_bool() == Some(false);
            if mode == OutputMode::Invalid && !failed {
                continue;
            }
            let mut values = point.key(&ids).into_vec();
            values.push(Value::String(rule.id.clone()));
            values.extend(kept.iter().map(|&i| point.get(i).clone()));
            if mode != OutputMode::Invalid {
                values.push(result);
            }
            values.push(if failed { rule.error_code.clone().into() } else { Value::Null });
            values.push(if failed { rule.error_level.into() } else { Value::Null });
            emitted.push(DataPoint::new(values));
        }
        Ok(emitted)
    })?;
    debug!(ruleset = %bound.name, input = rows.len(), rows = output.len(), "check_datapoint");
    Ok(Dataset::from_rows_unchecked(out, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::EvaluationContext;
    use crate::expression::operators::binary;
    use crate::expression::BinaryOp;

    fn dataset() -> Dataset {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::identifier("Id_3", ScalarType::String),
            Component::measure("Me_1", ScalarType::Integer),
            Component::measure("Me_2", ScalarType::Number),
        ])
        .unwrap();
        Dataset::from_values(
            structure,
            vec![
                vec![2011i64.into(), "CREDIT".into(), 10i64.into(), 1.0f64.into()],
                vec![2011i64.into(), "DEBIT".into(), (-2i64).into(), 2.0f64.into()],
            ],
        )
        .unwrap()
    }

    /// `when Id_3 = "DEBIT" then Me_1 >= 0`
    fn ruleset() -> BoundDatapointRuleset {
        let eq = binary(BinaryOp::Eq, Some(ScalarType::String), Some(ScalarType::String)).unwrap();
        let ge = binary(BinaryOp::Ge, Some(ScalarType::Integer), Some(ScalarType::Integer)).unwrap();
        let antecedent = ScalarExpression::apply(
            &eq,
            vec![ScalarExpression::variable("Id_3", ScalarType::String), ScalarExpression::literal("DEBIT".into())],
        );
        let consequent = ScalarExpression::apply(
            &ge,
            vec![ScalarExpression::variable("Me_1", ScalarType::Integer), ScalarExpression::literal(0i64.into())],
        );
        BoundDatapointRuleset {
            name: "dpr1".into(),
            rules: vec![CompiledDatapointRule {
                id: "dpr1_1".into(),
                antecedent: Some(antecedent),
                consequent,
                error_code: Some("Bad debit".into()),
                error_level: Some(1),
            }],
            measures: vec!["Me_1".into()],
        }
    }

    fn run(mode: OutputMode) -> Dataset {
        let ds = dataset();
        let bound = ruleset();
        let out = Arc::new(output_structure(ds.structure(), &bound, mode).unwrap());
        validate(&ds, &bound, mode, out, &EvaluationContext::new(), RowExecutor::Sequential).unwrap()
    }

    #[test]
    fn test_invalid_mode_emits_failures_only() {
        let result = run(OutputMode::Invalid);
        let names: Vec<&str> = result.structure().names().collect();
        assert_eq!(names, vec!["Id_1", "Id_3", "ruleid", "Me_1", "errorcode", "errorlevel"]);
        let rows = result.sorted_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].values(),
            &[
                Value::Integer(2011),
                Value::from("DEBIT"),
                Value::from("dpr1_1"),
                Value::Integer(-2),
                Value::from("Bad debit"),
                Value::Integer(1),
            ]
        );
    }

    #[test]
    fn test_all_modes_emit_every_pair() {
        let all = run(OutputMode::All);
        assert_eq!(all.row_count(), 2);
        let rows = all.sorted_rows();
        // CREDIT: antecedent false, so the rule holds with no error code.
        assert_eq!(rows[0].get(4), &Value::Boolean(true));
        assert_eq!(rows[0].get(5), &Value::Null);

        let measures = run(OutputMode::AllMeasures);
        assert!(measures.structure().contains("Me_2"));
        assert!(!all.structure().contains("Me_2"));
    }
}

//! Generic validation (`check`).
use super::ruleset::OutputMode;
use super::{BOOL_VAR, ERROR_CODE, ERROR_LEVEL, IMBALANCE};
use crate::computation::executor::RowExecutor;
use crate::computation::ComputationError;
use crate::expression::{RowScope, ScalarExpression, Scope};
use crate::model::{Component, DataPoint, DataStructure, Dataset, IdentifierKey, ModelError, ScalarType, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Operands of one `check` call.
pub struct CheckOperands<'a> {
    pub condition: &'a Dataset,
    pub imbalance: Option<&'a Dataset>,
    pub error_code: &'a ScalarExpression,
    pub error_level: &'a ScalarExpression,
}

/// The single measure of `structure`, which must satisfy `accept`.
pub fn sole_measure<'s>(
    structure: &'s DataStructure,
    dataset: &str,
    accept: impl Fn(ScalarType) -> bool,
    expected: &str,
) -> Result<&'s Component, ComputationError> {
    let mut measures = structure.measures();
    match (measures.next(), measures.next()) {
        (Some(m), None) if accept(m.value_type) => Ok(m),
        _ => Err(ComputationError::invalid_argument(
            "check",
            format!("dataset {dataset} must have exactly one {expected} measure"),
        )),
    }
}

pub fn output_structure(condition: &DataStructure, imbalance_type: Option<ScalarType>) -> Result<DataStructure, ComputationError> {
    let mut components: Vec<Component> = condition.identifiers().cloned().collect();
    components.push(Component::measure(BOOL_VAR, ScalarType::Boolean));
    components.push(Component::measure(IMBALANCE, imbalance_type.unwrap_or(ScalarType::Number)));
    components.push(Component::measure(ERROR_CODE, ScalarType::String));
    components.push(Component::measure(ERROR_LEVEL, ScalarType::Integer));
    Ok(DataStructure::new(components)?)
}

pub fn validate(
    operands: CheckOperands<'_>,
    mode: OutputMode,
    out: Arc<DataStructure>,
    outer: &dyn Scope,
    executor: RowExecutor,
) -> Result<Dataset, ComputationError> {
    let structure = operands.condition.structure();
    let rows = operands.condition.materialize();
    let ids = structure.identifier_indices();
    let condition_index = match structure.measures().next() {
        Some(m) => structure.index_of(&m.name).ok_or_else(|| ModelError::UnknownComponent(m.name.clone()))?,
        None => return Err(ComputationError::invalid_argument("check", "condition has no measure")),
    };

    // 1. Index the imbalance measure by the condition's identifier order.
    let mut imbalances: HashMap<IdentifierKey, Value> = HashMap::new();
    if let Some(imbalance) = operands.imbalance {
        let other = imbalance.structure();
        let measure = sole_measure(other, "imbalance", |t| t.is_numeric(), "numeric")?;
        let measure_index = other.index_of(&measure.name).ok_or_else(|| ModelError::UnknownComponent(measure.name.clone()))?;
        let key_cols = structure
            .identifiers()
            .map(|c| other.index_of(&c.name).ok_or_else(|| ModelError::UnknownComponent(c.name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        for row in imbalance.iter() {
            imbalances.insert(row.key(&key_cols), row.get(measure_index).clone());
        }
    }

    // 2. Evaluate per row.
    let output = executor.filter_map(&rows, |point: &DataPoint| {
        let holds = point.get(condition_index).clone();
        if mode == OutputMode::Invalid && holds.as_bool() != Some(false) {
            return Ok(None);
        }
        let key = point.key(&ids);
        let imbalance = imbalances.get(&key).cloned().unwrap_or(Value::Null);
        let (code, level) = if holds.as_bool() == Some(false) {
            let scope = RowScope::new(structure, point, outer);
            (operands.error_code.resolve(&scope)?, operands.error_level.resolve(&scope)?)
        } else {
            (Value::Null, Value::Null)
        };
        let mut values = key.into_vec();
        values.extend([holds, imbalance, code, level]);
        Ok(Some(DataPoint::new(values)))
    })?;
    debug!(input = rows.len(), rows = output.len(), "check");
    Ok(Dataset::from_rows_unchecked(out, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::EvaluationContext;

    fn condition() -> Dataset {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::measure("bool_var", ScalarType::Boolean),
        ])
        .unwrap();
        Dataset::from_values(
            structure,
            vec![
                vec![Value::Integer(1), Value::Boolean(true)],
                vec![Value::Integer(2), Value::Boolean(false)],
                vec![Value::Integer(3), Value::Null],
            ],
        )
        .unwrap()
    }

    fn imbalance() -> Dataset {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::measure("Me_1", ScalarType::Integer),
        ])
        .unwrap();
        Dataset::from_values(structure, vec![vec![Value::Integer(1), Value::Integer(0)], vec![Value::Integer(2), Value::Integer(5)]])
            .unwrap()
    }

    fn run(mode: OutputMode) -> Dataset {
        let (cond, imb) = (condition(), imbalance());
        let code = ScalarExpression::literal(Value::from("E1"));
        let level = ScalarExpression::literal(Value::Integer(2));
        let out = Arc::new(output_structure(cond.structure(), Some(ScalarType::Integer)).unwrap());
        let operands = CheckOperands { condition: &cond, imbalance: Some(&imb), error_code: &code, error_level: &level };
        validate(operands, mode, out, &EvaluationContext::new(), RowExecutor::Sequential).unwrap()
    }

    #[test]
    fn test_codes_only_on_failure() {
        let rows = run(OutputMode::All).sorted_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values(), &[Value::Integer(1), Value::Boolean(true), Value::Integer(0), Value::Null, Value::Null]);
        assert_eq!(
            rows[1].values(),
            &[Value::Integer(2), Value::Boolean(false), Value::Integer(5), Value::from("E1"), Value::Integer(2)]
        );
        // No imbalance row for Id_1 = 3.
        assert_eq!(rows[2].get(2), &Value::Null);
    }

    #[test]
    fn test_invalid_is_false_subset() {
        let all = run(OutputMode::All);
        let invalid = run(OutputMode::Invalid);
        let expected: Vec<DataPoint> =
            all.sorted_rows().into_iter().filter(|r| r.get(1) == &Value::Boolean(false)).collect();
        assert_eq!(invalid.structure(), all.structure());
        assert_eq!(invalid.sorted_rows(), expected);
    }

    #[test]
    fn test_unlinked_operands_are_errors() {
        let code = ScalarExpression::literal(Value::Null);
        let level = ScalarExpression::literal(Value::Null);
        let ctx = EvaluationContext::new();

        let ids_only = Dataset::empty(DataStructure::new(vec![Component::identifier("Id_1", ScalarType::Integer)]).unwrap());
        let out = Arc::new(output_structure(ids_only.structure(), None).unwrap());
        let operands = CheckOperands { condition: &ids_only, imbalance: None, error_code: &code, error_level: &level };
        assert!(validate(operands, OutputMode::All, out, &ctx, RowExecutor::Sequential).is_err());

        let cond = condition();
        let other_ids = Dataset::empty(
            DataStructure::new(vec![
                Component::identifier("Id_9", ScalarType::Integer),
                Component::measure("Me_1", ScalarType::Integer),
            ])
            .unwrap(),
        );
        let out = Arc::new(output_structure(cond.structure(), Some(ScalarType::Integer)).unwrap());
        let operands = CheckOperands { condition: &cond, imbalance: Some(&other_ids), error_code: &code, error_level: &level };
        let err = validate(operands, OutputMode::All, out, &ctx, RowExecutor::Sequential).unwrap_err();
        assert!(matches!(err, ComputationError::Model(ModelError::UnknownComponent(name)) if name == "Id_1"));
    }
}

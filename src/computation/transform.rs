//! Structure derivation and row-level transforms shared by the engines.
//!
//! The `*_structure` functions are pure and run at compile time to give
//! deferred expressions their output structure; the engines call the same
//! functions before touching rows.
use super::analytic::{self, AnalyticCall};
use super::error::ComputationError;
use super::executor::RowExecutor;
use crate::expression::{Operation, RowScope, ScalarExpression, Scope};
use crate::model::{Component, DataPoint, DataStructure, Dataset, IdentifierKey, ModelError, Role, ScalarType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One `calc` item after compilation.
#[derive(Debug, Clone)]
pub struct CalcColumn {
    pub name: String,
    pub role: Role,
    pub expression: ScalarExpression,
}

/// An operand of a measure-wise dataset operation.
#[derive(Debug, Clone)]
pub enum MapOperand {
    Dataset(Dataset),
    Scalar(Value),
}

/// One output measure: the operation and, per operand, the measure it reads.
/// Scalar operands have no source.
#[derive(Debug, Clone)]
pub struct MeasureOutput {
    pub name: String,
    pub operation: Operation,
    pub sources: Vec<Option<String>>,
}

/// Applies scalar operations measure by measure. Dataset operands are
/// inner-joined on their identifiers.
#[derive(Debug, Clone)]
pub struct MeasureMap {
    pub identifiers: Vec<Component>,
    pub outputs: Vec<MeasureOutput>,
}

// --- Structures ---

pub fn rename_structure(structure: &DataStructure, mapping: &[(String, String)]) -> Result<DataStructure, ComputationError> {
    let mut targets: HashMap<&str, &str> = HashMap::new();
    for (from, to) in mapping {
        structure.require(from)?;
        if targets.insert(from.as_str(), to.as_str()).is_some() {
            return Err(ComputationError::invalid_argument("rename", format!("component {from} is renamed twice")));
        }
    }
    let components = structure.components().map(|c| match targets.get(c.name.as_str()) {
        Some(to) => c.renamed(*to),
        None => c.clone(),
    });
    Ok(DataStructure::new(components)?)
}

/// `keep` retains the listed components, `drop` removes them. Identifiers are
/// always retained and cannot be listed.
pub fn project_structure(structure: &DataStructure, names: &[String], keep: bool) -> Result<DataStructure, ComputationError> {
    let operator = if keep { "keep" } else { "drop" };
    for name in names {
        if structure.require(name)?.is_identifier() {
            return Err(ComputationError::invalid_argument(operator, format!("identifier {name} cannot be listed")));
        }
    }
    let components = structure
        .components()
        .filter(|c| c.is_identifier() || names.contains(&c.name) == keep)
        .cloned();
    Ok(DataStructure::new(components)?)
}

/// Existing non-identifier components are replaced in place; new ones are
/// appended in item order.
pub fn calc_structure(structure: &DataStructure, columns: &[(String, Role, ScalarType)]) -> Result<DataStructure, ComputationError> {
    let mut components: Vec<Component> = structure.components().cloned().collect();
    for (name, role, ty) in columns {
        let replacement = Component::new(name.clone(), *ty, *role);
        match structure.get(name) {
            Some(c) if c.is_identifier() => {
                return Err(ComputationError::invalid_argument("calc", format!("identifier {name} cannot be overwritten")));
            }
            Some(_) => {
                if let Some(slot) = components.iter_mut().find(|c| &c.name == name) {
                    *slot = replacement;
                }
            }
            None if components.iter().any(|c| &c.name == name) => {
                return Err(ModelError::DuplicateComponent(name.clone()).into());
            }
            None => components.push(replacement),
        }
    }
    Ok(DataStructure::new(components)?)
}

pub fn analytic_structure(structure: &DataStructure, calls: &[AnalyticCall]) -> Result<DataStructure, ComputationError> {
    let columns = calls
        .iter()
        .map(|call| {
            let source = structure.require(&call.source)?;
            Ok((call.target.clone(), Role::Measure, call.function.result_type(source.value_type)))
        })
        .collect::<Result<Vec<_>, ComputationError>>()?;
    calc_structure(structure, &columns)
}

impl MeasureMap {
    pub fn structure(&self) -> Result<DataStructure, ModelError> {
        let measures = self.outputs.iter().map(|o| Component::measure(o.name.clone(), o.operation.result));
        DataStructure::new(self.identifiers.iter().cloned().chain(measures))
    }
}

// --- Rows ---

pub fn filter(
    dataset: &Dataset,
    condition: &ScalarExpression,
    outer: &dyn Scope,
    executor: RowExecutor,
) -> Result<Vec<DataPoint>, ComputationError> {
    let structure = dataset.structure();
    let rows = dataset.materialize();
    executor.filter_map(&rows, |point: &DataPoint| {
        let scope = RowScope::new(structure, point, outer);
        let keep = condition.resolve(&scope)?.as_bool() == Some(true);
        Ok(keep.then(|| point.clone()))
    })
}

pub fn project(dataset: &Dataset, out: &DataStructure) -> Result<Vec<DataPoint>, ComputationError> {
    let structure = dataset.structure();
    let indices = out
        .names()
        .map(|name| structure.index_of(name).ok_or_else(|| ModelError::UnknownComponent(name.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dataset.iter().map(|row| row.project(&indices)).collect())
}

/// Every item sees the input row, not the values of earlier items.
pub fn calc(
    dataset: &Dataset,
    columns: &[CalcColumn],
    out: &DataStructure,
    outer: &dyn Scope,
    executor: RowExecutor,
) -> Result<Vec<DataPoint>, ComputationError> {
    let structure = dataset.structure();
    let rows = dataset.materialize();
    let slots = output_slots(out, columns.iter().map(|c| c.name.as_str()))?;
    executor.map(&rows, |point: &DataPoint| {
        let scope = RowScope::new(structure, point, outer);
        let mut values = widen(point, out.len());
        for (column, &slot) in columns.iter().zip(&slots) {
            values[slot] = column.expression.resolve(&scope)?;
        }
        Ok(DataPoint::new(values))
    })
}

pub fn analytic(dataset: &Dataset, calls: &[AnalyticCall], out: &DataStructure) -> Result<Vec<DataPoint>, ComputationError> {
    let structure = dataset.structure();
    let rows = dataset.materialize();
    let slots = output_slots(out, calls.iter().map(|c| c.target.as_str()))?;
    let computed = calls
        .iter()
        .map(|call| analytic::evaluate(&rows, structure, call))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .iter()
        .enumerate()
        .map(|(r, point)| {
            let mut values = widen(point, out.len());
            for (column, &slot) in computed.iter().zip(&slots) {
                values[slot] = column[r].clone();
            }
            DataPoint::new(values)
        })
        .collect())
}

pub fn measure_map(
    operands: &[MapOperand],
    map: &MeasureMap,
    executor: RowExecutor,
) -> Result<Vec<DataPoint>, ComputationError> {
    let id_names: Vec<&str> = map.identifiers.iter().map(|c| c.name.as_str()).collect();
    let Some(driver) = operands.iter().position(|o| matches!(o, MapOperand::Dataset(_))) else {
        return Err(ComputationError::invalid_argument("measure map", "no dataset operand"));
    };

    // 1. Index every dataset operand by identifiers, and resolve measure positions.
    let mut indexed: Vec<Option<HashMap<IdentifierKey, DataPoint>>> = Vec::with_capacity(operands.len());
    let mut driver_rows = Arc::new(Vec::new());
    let mut driver_ids = Vec::new();
    for (i, operand) in operands.iter().enumerate() {
        match operand {
            MapOperand::Dataset(ds) => {
                let ids = positions(ds.structure(), &id_names)?;
                if i == driver {
                    driver_rows = ds.materialize();
                    driver_ids = ids;
                    indexed.push(None);
                } else {
                    indexed.push(Some(ds.iter().map(|row| (row.key(&ids), row)).collect()));
                }
            }
            MapOperand::Scalar(_) => indexed.push(None),
        }
    }
    let sources: Vec<Vec<Option<usize>>> = map
        .outputs
        .iter()
        .map(|output| {
            output
                .sources
                .iter()
                .zip(operands)
                .map(|(source, operand)| match (source, operand) {
                    (Some(name), MapOperand::Dataset(ds)) => {
                        ds.structure().index_of(name).map(Some).ok_or_else(|| ModelError::UnknownComponent(name.clone()))
                    }
                    _ => Ok(None),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    // 2. Join on the driver's rows and apply every output operation.
    executor.filter_map(&driver_rows, |point: &DataPoint| {
        let key = point.key(&driver_ids);
        let mut matched: Vec<Option<&DataPoint>> = Vec::with_capacity(operands.len());
        for (i, index) in indexed.iter().enumerate() {
            match index {
                Some(rows) => match rows.get(&key) {
                    Some(row) => matched.push(Some(row)),
                    None => return Ok(None),
                },
                None if i == driver => matched.push(Some(point)),
                None => matched.push(None),
            }
        }
        let mut values = key.to_vec();
        for (output, positions) in map.outputs.iter().zip(&sources) {
            let args: Vec<Value> = operands
                .iter()
                .zip(positions)
                .zip(&matched)
                .map(|((operand, position), row)| match (operand, position, row) {
                    (MapOperand::Scalar(v), _, _) => v.clone(),
                    (_, Some(p), Some(row)) => row.get(*p).clone(),
                    _ => Value::Null,
                })
                .collect();
            values.push(output.operation.call(&args)?);
        }
        Ok(Some(DataPoint::new(values)))
    })
}

fn positions(structure: &DataStructure, names: &[&str]) -> Result<Vec<usize>, ModelError> {
    names
        .iter()
        .map(|n| structure.index_of(n).ok_or_else(|| ModelError::UnknownComponent(n.to_string())))
        .collect()
}

fn output_slots<'a>(out: &DataStructure, names: impl Iterator<Item = &'a str>) -> Result<Vec<usize>, ModelError> {
    names
        .map(|n| out.index_of(n).ok_or_else(|| ModelError::UnknownComponent(n.to_string())))
        .collect()
}

/// The row's values padded with nulls to `len` columns.
fn widen(point: &DataPoint, len: usize) -> Vec<Value> {
    let mut values = point.values().to_vec();
    values.resize(len, Value::Null);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computation::EvaluationContext;
    use crate::expression::operators::binary;
    use crate::expression::BinaryOp;

    fn structure() -> DataStructure {
        DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::measure("Me_1", ScalarType::Integer),
            Component::measure("Me_2", ScalarType::Number),
            Component::attribute("At_1", ScalarType::String),
        ])
        .unwrap()
    }

    fn dataset(rows: &[(i64, i64)]) -> Dataset {
        let values = rows
            .iter()
            .map(|&(k, v)| vec![Value::Integer(k), Value::Integer(v), Value::Number(v as f64 / 2.0), Value::Null])
            .collect();
        Dataset::from_values(structure(), values).unwrap()
    }

    fn names(structure: &DataStructure) -> Vec<&str> {
        structure.names().collect()
    }

    #[test]
    fn test_rename_allows_swaps_and_rejects_collisions() {
        let swap = vec![("Me_1".to_string(), "Me_2".to_string()), ("Me_2".to_string(), "Me_1".to_string())];
        let swapped = rename_structure(&structure(), &swap).unwrap();
        assert_eq!(names(&swapped), vec!["Id_1", "Me_2", "Me_1", "At_1"]);
        assert_eq!(swapped.get("Me_1").map(|c| c.value_type), Some(ScalarType::Number));

        let collide = vec![("Me_1".to_string(), "Me_2".to_string())];
        assert_eq!(
            rename_structure(&structure(), &collide),
            Err(ComputationError::Model(ModelError::DuplicateComponent("Me_2".into())))
        );
    }

    #[test]
    fn test_project_never_lists_identifiers() {
        let kept = project_structure(&structure(), &["Me_2".to_string()], true).unwrap();
        assert_eq!(names(&kept), vec!["Id_1", "Me_2"]);
        let dropped = project_structure(&structure(), &["Me_2".to_string()], false).unwrap();
        assert_eq!(names(&dropped), vec!["Id_1", "Me_1", "At_1"]);
        assert!(project_structure(&structure(), &["Id_1".to_string()], false).is_err());
    }

    #[test]
    fn test_calc_replaces_in_place_and_appends() {
        let columns = vec![
            ("Me_2".to_string(), Role::Attribute, ScalarType::String),
            ("Me_3".to_string(), Role::Measure, ScalarType::Boolean),
        ];
        let out = calc_structure(&structure(), &columns).unwrap();
        assert_eq!(names(&out), vec!["Id_1", "Me_1", "Me_2", "At_1", "Me_3"]);
        assert_eq!(out.get("Me_2").map(|c| c.role), Some(Role::Attribute));

        let over_id = vec![("Id_1".to_string(), Role::Measure, ScalarType::Integer)];
        assert!(calc_structure(&structure(), &over_id).is_err());
    }

    #[test]
    fn test_calc_items_read_the_input_row() {
        let ds = dataset(&[(1, 10)]);
        let add = binary(BinaryOp::Add, Some(ScalarType::Integer), Some(ScalarType::Integer)).unwrap();
        let twice = ScalarExpression::apply(
            &add,
            vec![ScalarExpression::variable("Me_1", ScalarType::Integer), ScalarExpression::variable("Me_1", ScalarType::Integer)],
        );
        let columns = vec![
            CalcColumn { name: "Me_1".into(), role: Role::Measure, expression: twice.clone() },
            CalcColumn { name: "Me_3".into(), role: Role::Measure, expression: twice },
        ];
        let shape: Vec<_> = columns.iter().map(|c| (c.name.clone(), c.role, ScalarType::Integer)).collect();
        let out = calc_structure(ds.structure(), &shape).unwrap();
        let rows = calc(&ds, &columns, &out, &EvaluationContext::new(), RowExecutor::Sequential).unwrap();
        assert_eq!(rows[0].get(1), &Value::Integer(20));
        assert_eq!(rows[0].get(4), &Value::Integer(20));
    }

    #[test]
    fn test_measure_map_inner_joins() {
        let left = dataset(&[(1, 10), (2, 20)]);
        let right = dataset(&[(2, 5), (3, 7)]);
        let sub = binary(BinaryOp::Sub, Some(ScalarType::Integer), Some(ScalarType::Integer)).unwrap();
        let map = MeasureMap {
            identifiers: left.structure().identifiers().cloned().collect(),
            outputs: vec![MeasureOutput {
                name: "Me_1".into(),
                operation: sub,
                sources: vec![Some("Me_1".into()), Some("Me_1".into())],
            }],
        };
        let operands = [MapOperand::Dataset(left), MapOperand::Dataset(right)];
        let rows = measure_map(&operands, &map, RowExecutor::Sequential).unwrap();
        assert_eq!(rows, vec![DataPoint::new(vec![Value::Integer(2), Value::Integer(15)])]);
    }

    #[test]
    fn test_measure_map_with_scalar_operand() {
        let ds = dataset(&[(1, 10)]);
        let mul = binary(BinaryOp::Mul, Some(ScalarType::Integer), Some(ScalarType::Integer)).unwrap();
        let map = MeasureMap {
            identifiers: ds.structure().identifiers().cloned().collect(),
            outputs: vec![MeasureOutput { name: "Me_1".into(), operation: mul, sources: vec![None, Some("Me_1".into())] }],
        };
        let operands = [MapOperand::Scalar(Value::Integer(3)), MapOperand::Dataset(ds)];
        let rows = measure_map(&operands, &map, RowExecutor::Parallel).unwrap();
        assert_eq!(rows[0].get(1), &Value::Integer(30));
        assert_eq!(names(&map.structure().unwrap()), vec!["Id_1", "Me_1"]);
    }
}

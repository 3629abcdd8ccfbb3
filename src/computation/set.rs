//! Set operations over datasets of equal structure.
use super::error::ComputationError;
use crate::model::{DataPoint, DataStructure, Dataset, IdentifierKey, ModelError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOp {
    Union,
    Intersect,
    SetDiff,
    SymDiff,
}

impl SetOp {
    pub fn name(&self) -> &'static str {
        match self {
            SetOp::Union => "union",
            SetOp::Intersect => "intersect",
            SetOp::SetDiff => "setdiff",
            SetOp::SymDiff => "symdiff",
        }
    }

    /// `setdiff` and `symdiff` are binary; the others take two or more operands.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            SetOp::Union | SetOp::Intersect => (2, usize::MAX),
            SetOp::SetDiff | SetOp::SymDiff => (2, 2),
        }
    }
}

/// Two structures are set-compatible when they hold the same components,
/// whatever their column order.
pub fn compatible(a: &DataStructure, b: &DataStructure) -> bool {
    a.len() == b.len() && a.components().all(|c| b.get(&c.name) == Some(c))
}

/// The rows of `dataset` reordered to `target`'s columns, keyed by identifiers.
fn aligned(dataset: &Dataset, target: &DataStructure) -> Result<IndexMap<IdentifierKey, DataPoint>, ModelError> {
    let source = dataset.structure();
    let order = target
        .names()
        .map(|name| source.index_of(name).ok_or_else(|| ModelError::UnknownComponent(name.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    let ids = target.identifier_indices();
    Ok(dataset
        .iter()
        .map(|row| {
            let row = row.project(&order);
            (row.key(&ids), row)
        })
        .collect())
}

pub fn evaluate(op: SetOp, operands: &[Dataset]) -> Result<Dataset, ComputationError> {
    let Some(first) = operands.first() else {
        return Err(ComputationError::invalid_argument(op.name(), "no operands"));
    };
    let structure: Arc<DataStructure> = first.structure_arc();
    let mut sides = operands
        .iter()
        .map(|d| aligned(d, &structure))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let mut result = sides.next().unwrap_or_default();

    match op {
        SetOp::Union => {
            for side in sides {
                for (key, row) in side {
                    result.entry(key).or_insert(row);
                }
            }
        }
        SetOp::Intersect => {
            for side in sides {
                result.retain(|key, _| side.contains_key(key));
            }
        }
        SetOp::SetDiff => {
            for side in sides {
                result.retain(|key, _| !side.contains_key(key));
            }
        }
        SetOp::SymDiff => {
            for side in sides {
                let left: HashSet<IdentifierKey> = result.keys().cloned().collect();
                result.retain(|key, _| !side.contains_key(key));
                result.extend(side.into_iter().filter(|(key, _)| !left.contains(key)));
            }
        }
    }
    Ok(Dataset::from_rows_unchecked(structure, result.into_values().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ScalarType, Value};
    use rstest::rstest;

    fn dataset(rows: &[(i64, i64)]) -> Dataset {
        let structure = DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::Integer),
            Component::measure("Me_1", ScalarType::Integer),
        ])
        .unwrap();
        Dataset::from_values(structure, rows.iter().map(|&(k, v)| vec![Value::Integer(k), Value::Integer(v)]).collect())
            .unwrap()
    }

    #[rstest]
    #[case(SetOp::Union, vec![(1, 10), (2, 20), (3, 300)])]
    #[case(SetOp::Intersect, vec![(2, 20)])]
    #[case(SetOp::SetDiff, vec![(1, 10)])]
    #[case(SetOp::SymDiff, vec![(1, 10), (3, 300)])]
    fn test_set_operations(#[case] op: SetOp, #[case] expected: Vec<(i64, i64)>) {
        let a = dataset(&[(1, 10), (2, 20)]);
        let b = dataset(&[(2, 200), (3, 300)]);
        let result = evaluate(op, &[a, b]).unwrap();
        assert_eq!(result, dataset(&expected));
    }

    #[test]
    fn test_union_aligns_column_order() {
        let a = dataset(&[(1, 10)]);
        let swapped = DataStructure::new(vec![
            Component::measure("Me_1", ScalarType::Integer),
            Component::identifier("Id_1", ScalarType::Integer),
        ])
        .unwrap();
        assert!(compatible(a.structure(), &swapped));
        let b = Dataset::from_values(swapped, vec![vec![Value::Integer(5), Value::Integer(2)]]).unwrap();
        let result = evaluate(SetOp::Union, &[a, b]).unwrap();
        assert_eq!(result, dataset(&[(1, 10), (2, 5)]));
    }
}

//! Data points and datasets.
use super::error::ModelError;
use super::structure::DataStructure;
use super::value::Value;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The identifier tuple of a data point, used as a join and uniqueness key.
pub type IdentifierKey = SmallVec<[Value; 4]>;

/// A single row, stored positionally in the owning structure's column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DataPoint(Vec<Value>);

impl DataPoint {
    pub fn new(values: Vec<Value>) -> Self { Self(values) }

    pub fn values(&self) -> &[Value] { &self.0 }
    pub fn into_values(self) -> Vec<Value> { self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn get(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&Value::Null)
    }

    /// Extracts the values at the given positions as a key.
    pub fn key(&self, indices: &[usize]) -> IdentifierKey {
        indices.iter().map(|&i| self.get(i).clone()).collect()
    }

    /// Builds a new point from the values at the given positions.
    pub fn project(&self, indices: &[usize]) -> DataPoint {
        DataPoint(indices.iter().map(|&i| self.get(i).clone()).collect())
    }

    pub fn push(&mut self, value: Value) { self.0.push(value); }
}

impl From<Vec<Value>> for DataPoint {
    fn from(values: Vec<Value>) -> Self { Self(values) }
}

/// A restartable producer of data points.
pub type RowProducer = Arc<dyn Fn() -> Box<dyn Iterator<Item = DataPoint> + Send> + Send + Sync>;

/// The rows of a dataset, held in memory or produced on demand.
#[derive(Clone)]
pub enum Rows {
    Materialized(Arc<Vec<DataPoint>>),
    Lazy(RowProducer),
}

/// A typed, identifier-keyed collection of data points.
#[derive(Clone)]
pub struct Dataset {
    structure: Arc<DataStructure>,
    rows: Rows,
}

impl Dataset {
    /// Builds a dataset, checking row arity, value types and identifier uniqueness.
    pub fn new(structure: impl Into<Arc<DataStructure>>, rows: Vec<DataPoint>) -> Result<Self, ModelError> {
        let structure = structure.into();
        validate_rows(&structure, &rows)?;
        Ok(Self { structure, rows: Rows::Materialized(Arc::new(rows)) })
    }

    /// Convenience constructor from raw value rows.
    pub fn from_values(structure: impl Into<Arc<DataStructure>>, rows: Vec<Vec<Value>>) -> Result<Self, ModelError> {
        Self::new(structure, rows.into_iter().map(DataPoint::new).collect())
    }

    /// Wraps a restartable producer. Every iteration must yield the same rows,
    /// each conforming to `structure`.
    pub fn lazy(structure: impl Into<Arc<DataStructure>>, producer: RowProducer) -> Self {
        Self { structure: structure.into(), rows: Rows::Lazy(producer) }
    }

    /// Builds a dataset from rows an engine already knows to be valid.
    pub(crate) fn from_rows_unchecked(structure: Arc<DataStructure>, rows: Vec<DataPoint>) -> Self {
        Self { structure, rows: Rows::Materialized(Arc::new(rows)) }
    }

    /// The same rows under a structure of identical arity, such as a renamed one.
    pub(crate) fn restructured(&self, structure: Arc<DataStructure>) -> Self {
        Self { structure, rows: self.rows.clone() }
    }

    pub fn empty(structure: impl Into<Arc<DataStructure>>) -> Self {
        Self { structure: structure.into(), rows: Rows::Materialized(Arc::new(Vec::new())) }
    }

    pub fn structure(&self) -> &DataStructure { &self.structure }
    pub fn structure_arc(&self) -> Arc<DataStructure> { Arc::clone(&self.structure) }
    pub fn rows(&self) -> &Rows { &self.rows }
    pub fn is_materialized(&self) -> bool { matches!(self.rows, Rows::Materialized(_)) }

    /// Iterates the rows. Lazy rows are produced afresh on every call.
    pub fn iter(&self) -> Box<dyn Iterator<Item = DataPoint> + Send + '_> {
        match &self.rows {
            Rows::Materialized(rows) => Box::new(rows.iter().cloned()),
            Rows::Lazy(producer) => producer(),
        }
    }

    /// Returns the rows held in memory, producing them once if lazy.
    pub fn materialize(&self) -> Arc<Vec<DataPoint>> {
        match &self.rows {
            Rows::Materialized(rows) => Arc::clone(rows),
            Rows::Lazy(producer) => Arc::new(producer().collect()),
        }
    }

    /// This dataset with its rows held in memory.
    pub fn into_materialized(self) -> Self {
        match self.rows {
            Rows::Materialized(_) => self,
            Rows::Lazy(ref producer) => {
                let rows = Rows::Materialized(Arc::new(producer().collect()));
                Self { structure: self.structure, rows }
            }
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.rows {
            Rows::Materialized(rows) => rows.len(),
            Rows::Lazy(producer) => producer().count(),
        }
    }

    /// Looks up a named value in a row of this dataset.
    pub fn value<'r>(&self, point: &'r DataPoint, name: &str) -> Option<&'r Value> {
        self.structure.index_of(name).map(|i| point.get(i))
    }

    /// Rows sorted by their identifier tuple, for deterministic rendering.
    pub fn sorted_rows(&self) -> Vec<DataPoint> {
        let ids = self.structure.identifier_indices();
        let mut rows: Vec<DataPoint> = self.materialize().as_ref().clone();
        rows.sort_by(|a, b| {
            ids.iter()
                .map(|&i| a.get(i).total_cmp(b.get(i)))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    /// Rows as name-keyed records in identifier order.
    pub fn records(&self) -> Vec<IndexMap<String, Value>> {
        self.sorted_rows()
            .into_iter()
            .map(|point| {
                self.structure
                    .names()
                    .map(str::to_string)
                    .zip(point.into_values())
                    .collect()
            })
            .collect()
    }
}

fn validate_rows(structure: &DataStructure, rows: &[DataPoint]) -> Result<(), ModelError> {
    let ids = structure.identifier_indices();
    let mut seen: HashSet<IdentifierKey> = HashSet::with_capacity(rows.len());
    for (row, point) in rows.iter().enumerate() {
        if point.len() != structure.len() {
            return Err(ModelError::RowArity { row, expected: structure.len(), actual: point.len() });
        }
        for (component, value) in structure.components().zip(point.values()) {
            if !value.conforms_to(component.value_type) {
                return Err(ModelError::ValueType {
                    component: component.name.clone(),
                    expected: component.value_type,
                    value: value.to_string(),
                });
            }
        }
        let key = point.key(&ids);
        if !seen.insert(key.clone()) {
            return Err(ModelError::DuplicateIdentifier(format_key(&key)));
        }
    }
    Ok(())
}

pub(crate) fn format_key(key: &[Value]) -> String {
    key.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Dataset");
        d.field("structure", &self.structure);
        match &self.rows {
            Rows::Materialized(rows) => d.field("rows", rows),
            Rows::Lazy(_) => d.field("rows", &"<lazy>"),
        };
        d.finish()
    }
}

impl PartialEq for Dataset {
    /// Logical equality: same structure and the same set of rows, regardless of order.
    fn eq(&self, other: &Self) -> bool {
        if self.structure != other.structure {
            return false;
        }
        let a: HashSet<DataPoint> = self.iter().collect();
        let b: HashSet<DataPoint> = other.iter().collect();
        a == b
    }
}

struct RecordRow<'a>(&'a DataStructure, DataPoint);

impl Serialize for RecordRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0.names().zip(self.1.values()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<RecordRow<'_>> = self.sorted_rows().into_iter().map(|p| RecordRow(&self.structure, p)).collect();
        let mut s = serializer.serialize_struct("Dataset", 2)?;
        s.serialize_field("structure", self.structure.as_ref())?;
        s.serialize_field("rows", &rows)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ScalarType};

    fn structure() -> DataStructure {
        DataStructure::new(vec![
            Component::identifier("Id_1", ScalarType::String),
            Component::measure("Me_1", ScalarType::Integer),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = Dataset::from_values(
            structure(),
            vec![vec!["A".into(), 1i64.into()], vec!["A".into(), 2i64.into()]],
        )
        .unwrap_err();
        assert_eq!(err, ModelError::DuplicateIdentifier("A".into()));
    }

    #[test]
    fn test_row_type_mismatch_rejected() {
        let err = Dataset::from_values(structure(), vec![vec!["A".into(), 1.5f64.into()]]).unwrap_err();
        assert!(matches!(err, ModelError::ValueType { ref component, .. } if component == "Me_1"));
    }

    #[test]
    fn test_null_measure_accepted() {
        let ds = Dataset::from_values(structure(), vec![vec!["A".into(), Value::Null]]).unwrap();
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn test_lazy_rows_are_restartable() {
        let producer: RowProducer = Arc::new(|| {
            Box::new((0..3i64).map(|i| DataPoint::new(vec![Value::String(format!("k{}", i)), Value::Integer(i)])))
        });
        let ds = Dataset::lazy(structure(), producer);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.iter().count(), 3);
        let eager = Dataset::from_values(
            structure(),
            (0..3i64).map(|i| vec![Value::String(format!("k{}", i)), Value::Integer(i)]).collect(),
        )
        .unwrap();
        assert_eq!(ds, eager);
    }
}

//! Loading text rows (as produced by an external reader) into a dataset.
//!
//! Column mapping problems are fatal; cell-level parse failures are collected
//! per row so that a single malformed record does not abort the load.
use super::dataset::{format_key, DataPoint, Dataset, IdentifierKey};
use super::error::ModelError;
use super::structure::DataStructure;
use super::value::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A row that could not be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    /// Zero-based position of the row in the input.
    pub row: usize,
    pub error: ModelError,
}

/// The outcome of a load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failures: Vec<RowFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool { self.failures.is_empty() }
}

/// Loads `rows` of text cells laid out as `header` into `structure`.
///
/// Every header column must name a declared component. Components absent from
/// the header are null. Empty cells are null.
pub fn load_text_rows<R, C>(
    structure: impl Into<Arc<DataStructure>>,
    header: &[&str],
    rows: R,
) -> Result<(Dataset, LoadReport), ModelError>
where
    R: IntoIterator<Item = Vec<C>>,
    C: AsRef<str>,
{
    let structure = structure.into();

    // 1. Map columns to component positions.
    let mut mapping = Vec::with_capacity(header.len());
    for column in header {
        let index = structure
            .index_of(column)
            .ok_or_else(|| ModelError::UnmappedColumn(column.to_string()))?;
        if mapping.contains(&index) {
            return Err(ModelError::DuplicateComponent(column.to_string()));
        }
        mapping.push(index);
    }

    // 2. Parse each row, collecting failures.
    let ids = structure.identifier_indices();
    let mut seen: HashSet<IdentifierKey> = HashSet::new();
    let mut points = Vec::new();
    let mut report = LoadReport::default();

    for (row, cells) in rows.into_iter().enumerate() {
        match parse_row(&structure, &mapping, row, &cells) {
            Ok(point) => {
                let key = point.key(&ids);
                if seen.insert(key.clone()) {
                    points.push(point);
                } else {
                    report.failures.push(RowFailure { row, error: ModelError::DuplicateIdentifier(format_key(&key)) });
                }
            }
            Err(error) => report.failures.push(RowFailure { row, error }),
        }
    }

    report.loaded = points.len();
    if !report.is_clean() {
        warn!(failed = report.failures.len(), loaded = report.loaded, "rows rejected during load");
    }
    debug!(rows = report.loaded, columns = header.len(), "loaded text rows");
    Ok((Dataset::from_rows_unchecked(structure, points), report))
}

fn parse_row<C: AsRef<str>>(
    structure: &DataStructure,
    mapping: &[usize],
    row: usize,
    cells: &[C],
) -> Result<DataPoint, ModelError> {
    if cells.len() != mapping.len() {
        return Err(ModelError::RowArity { row, expected: mapping.len(), actual: cells.len() });
    }
    let mut values = vec![Value::Null; structure.len()];
    for (cell, &index) in cells.iter().zip(mapping) {
        let text = cell.as_ref();
        if text.is_empty() {
            continue;
        }
        let component = structure.component_at(index).ok_or(ModelError::RowArity {
            row,
            expected: structure.len(),
            actual: index,
        })?;
        values[index] = Value::parse(text, component.value_type).ok_or_else(|| ModelError::ValueType {
            component: component.name.clone(),
            expected: component.value_type,
            value: text.to_string(),
        })?;
    }
    Ok(DataPoint::new(values))
}

//! Defines the error types for the data model.
use super::types::ScalarType;
use thiserror::Error;

/// A violated structure or row invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Data structure has no identifier component")]
    NoIdentifier,
    #[error("Component '{0}' is declared more than once")]
    DuplicateComponent(String),
    #[error("Component '{0}' not contained in data structure")]
    UnknownComponent(String),
    #[error("Row {row} has {actual} values but the structure declares {expected}")]
    RowArity { row: usize, expected: usize, actual: usize },
    #[error("Value '{value}' of component '{component}' does not conform to type {expected}")]
    ValueType { component: String, expected: ScalarType, value: String },
    #[error("Duplicate identifier values ({0})")]
    DuplicateIdentifier(String),
    #[error("Column '{0}' does not map to a declared component")]
    UnmappedColumn(String),
}

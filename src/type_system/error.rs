//! Defines the error types for the type system module.
use crate::model::ScalarType;
use thiserror::Error;

/// A static typing rule violation, positioned later by the compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeRuleError {
    #[error("Operator {operator} cannot be applied to {operands}")]
    InvalidOperands { operator: String, operands: String },
    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
    #[error("Cannot cast {from} to {to}")]
    InvalidCast { from: ScalarType, to: ScalarType },
}

impl TypeRuleError {
    pub(crate) fn operands(operator: &str, types: &[Option<ScalarType>]) -> Self {
        let operands = types.iter().map(|t| describe(*t)).collect::<Vec<_>>().join(", ");
        Self::InvalidOperands { operator: operator.to_string(), operands }
    }
}

/// Renders an operand type, where `None` is the untyped null literal.
pub fn describe(ty: Option<ScalarType>) -> String {
    ty.map_or_else(|| "null".to_string(), |t| t.to_string())
}

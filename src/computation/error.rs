//! Execution-time errors raised while resolving expressions.
use crate::model::{ModelError, ScalarType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Cannot cast '{value}' to {target}")]
    Cast { value: String, target: ScalarType },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {operation}")]
    Overflow { operation: String },
    #[error("Invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },
    #[error("Expected a {expected} value, found '{found}'")]
    UnexpectedValue { expected: ScalarType, found: String },
    #[error("{mode} input mode is not supported in check_hierarchy")]
    UnsupportedInputMode { mode: String },
    #[error("Dataset {dataset} is not monomeasure")]
    NotMonomeasure { dataset: String },
    #[error("Dataset {dataset} measure {measure} has to have number type")]
    NonNumericMeasure { dataset: String, measure: String },
    #[error("ComponentID {component} not contained in dataset {dataset}")]
    MissingRuleComponent { component: String, dataset: String },
    #[error("Variable '{0}' is not bound")]
    Unbound(String),
    #[error("Unknown processing engine '{0}'")]
    UnknownEngine(String),
    #[error("{0} is not implemented")]
    NotImplemented(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ComputationError {
    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument { function: function.to_string(), message: message.into() }
    }

    pub fn overflow(operation: &str) -> Self {
        Self::Overflow { operation: operation.to_string() }
    }
}

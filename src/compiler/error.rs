//! Compile-time errors, positioned at the offending syntax node.
use super::ast::Position;
use crate::computation::ComputationError;
use crate::type_system::TypeRuleError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {position}")]
pub struct CompileError {
    pub position: Position,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(position: Position, kind: impl Into<CompileErrorKind>) -> Self {
        Self { position, kind: kind.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    #[error(transparent)]
    Type(#[from] TypeRuleError),
    #[error("Unresolved identifier '{0}'")]
    UnresolvedIdentifier(String),
    #[error("Unknown ruleset '{0}'")]
    UnknownRuleset(String),
    #[error("'{name}' is bound to a {found}, expected a {expected}")]
    BindingKind { name: String, expected: &'static str, found: &'static str },
    #[error("Component '{component}' not found in {dataset}")]
    UnknownComponent { component: String, dataset: String },
    #[error("Component '{0}' already exists")]
    NameCollision(String),
    #[error("Expected {expected} operands to {operator}, found {found}")]
    Arity { operator: String, expected: String, found: usize },
    #[error("Expected a {expected} expression, found a {found}")]
    ExpressionKind { expected: &'static str, found: &'static str },
    #[error("{0} is not implemented")]
    NotImplemented(String),
    #[error("Invalid ruleset reference: {0}")]
    InvalidRulesetReference(String),
    #[error("Invalid argument to {operator}: {message}")]
    InvalidArgument { operator: String, message: String },
    #[error(transparent)]
    Engine(ComputationError),
}

impl CompileErrorKind {
    pub fn invalid_argument(operator: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument { operator: operator.to_string(), message: message.into() }
    }
}

impl From<ComputationError> for CompileErrorKind {
    /// Structural model errors carry their own compile-time meaning.
    fn from(error: ComputationError) -> Self {
        use crate::model::ModelError;
        match error {
            ComputationError::Model(ModelError::DuplicateComponent(name)) => CompileErrorKind::NameCollision(name),
            ComputationError::NotImplemented(what) => CompileErrorKind::NotImplemented(what),
            ComputationError::InvalidArgument { function, message } => CompileErrorKind::InvalidArgument { operator: function, message },
            other => CompileErrorKind::Engine(other),
        }
    }
}

//! Core of a VTL interpreter: typed dataset transformations and rule-based
//! validation.
//!
//! Hosts build [`compiler::ast`] trees (usually from a parser), then run them
//! through an [`Interpreter`] whose context holds the input datasets.

// --- MODULE DECLARATIONS ---
pub mod compiler;
pub mod computation;
pub mod config;
pub mod display;
pub mod error;
pub mod expression;
pub mod interpreter;
pub mod logging;
pub mod model;
pub mod type_system;
pub mod validation;

pub use compiler::ast::Statement;
pub use compiler::{CompileError, CompileErrorKind};
pub use computation::{Binding, ComputationError, EvaluationContext, ProcessingEngine};
pub use config::{ConfigError, EngineConfig, NonNullPolicy};
pub use error::VtlError;
pub use interpreter::Interpreter;
pub use model::{Component, DataPoint, DataStructure, Dataset, Role, ScalarType, Value};

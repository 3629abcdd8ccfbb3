use crate::compiler::CompileError;
use crate::computation::ComputationError;
use crate::config::ConfigError;
use thiserror::Error;

/// Any failure surfaced to a host.
#[derive(Error, Debug)]
pub enum VtlError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Computation(#[from] ComputationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

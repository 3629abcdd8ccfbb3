//! The tabular data model: typed values, components, structures and datasets.
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod structure;
pub mod types;
pub mod value;

pub use dataset::{DataPoint, Dataset, IdentifierKey, RowProducer, Rows};
pub use error::ModelError;
pub use ingest::{load_text_rows, LoadReport, RowFailure};
pub use structure::{Component, DataStructure};
pub use types::{PeriodIndicator, Role, ScalarType};
pub use value::Value;

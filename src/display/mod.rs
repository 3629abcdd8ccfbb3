pub mod table;

pub use table::{format_dataset, DEFAULT_ROW_LIMIT};

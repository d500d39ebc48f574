//! Tabular data: batches, file sources, schema inference and validation.

pub mod schema;
pub mod source;
pub mod validate;

pub use schema::{ColumnType, FeatureKind, FeatureSpec};
pub use source::{
    BatchSlice, CsvSource, DataBatch, DataSource, DataSourceType, JsonSource, JsonlSource,
};
pub use validate::validate_batch;

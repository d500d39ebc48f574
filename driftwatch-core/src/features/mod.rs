//! Feature preprocessing: imputation, frequency encoding and standardization.

pub mod encoder;
pub mod imputer;
pub mod pipeline;
pub mod scaler;

pub use encoder::{FrequencyEncoder, category_key};
pub use imputer::{ImputeStrategy, SimpleImputer};
pub use pipeline::FeaturePipeline;
pub use scaler::StandardScaler;

//! Numerical building blocks: statistics, linear algebra, and the PCA reduction model.

pub mod linalg;
pub mod pca;
pub mod stats;

pub use pca::{ComponentPolicy, NComponents, PcaModel};
pub use stats::TestOutcome;

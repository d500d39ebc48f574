//! # driftwatch-core
//!
//! Label-free drift detection for model inputs and targets.
//!
//! The central piece is [`DataReconstructionDriftCalculator`]: reference data is
//! imputed, frequency-encoded and standardized, compressed with PCA, and the
//! per-chunk mean reconstruction error of later data is compared against a
//! band derived from reference chunks. Univariate statistical tests, target
//! distribution monitoring and alert-count ranking complete the toolkit.
//!
//! ```no_run
//! use driftwatch_core::{CalculatorConfig, DataReconstructionDriftCalculator, Calculator};
//! # fn run(reference: &driftwatch_core::DataBatch, analysis: &driftwatch_core::DataBatch)
//! #     -> Result<(), driftwatch_core::DriftError> {
//! let config = CalculatorConfig::new(vec!["age".into(), "income".into()], "timestamp");
//! let mut calc = DataReconstructionDriftCalculator::new(config)?;
//! calc.fit(reference)?;
//! let result = calc.calculate(analysis)?;
//! for row in result.rows() {
//!     println!("{} {:.3} alert={}", row.chunk.key, row.reconstruction_error, row.alert);
//! }
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod chunk;
pub mod config;
pub mod data;
pub mod drift;
pub mod error;
pub mod features;

pub use chunk::{Chunk, ChunkPeriod, Chunker, ChunkingPolicy, Period};
pub use config::{
    CalculatorConfig, ChunkingConfig, DriftwatchConfig, OutputFormat, TargetConfig,
    UnivariateConfig, load_config,
};
pub use data::{DataBatch, DataSource, DataSourceType};
pub use drift::plots::{PlotKind, StepPlot};
pub use drift::{
    AlertCountRanking, AlertThresholds, Calculator, CalculatorResult,
    DataReconstructionDriftCalculator, ReconstructionDriftResult, TargetDistributionCalculator,
    TargetDistributionResult, UnivariateDriftResult, UnivariateStatisticalDriftCalculator,
};
pub use error::DriftError;

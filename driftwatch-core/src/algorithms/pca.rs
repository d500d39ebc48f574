//! Principal component analysis used as the reduction model.
//!
//! The subspace is spanned by the leading eigenvectors of the sample
//! covariance of the (standardized) reference features. Fitting is exact and
//! deterministic, so repeated fits on identical data give identical models.

use crate::algorithms::linalg::{covariance, symmetric_eigen};
use crate::algorithms::stats::ln_gamma;
use crate::error::DriftError;
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};

/// Default fraction of variance the retained components must explain.
pub const DEFAULT_VARIANCE_RETAINED: f64 = 0.65;

/// How many components to keep.
///
/// Deserializes from `3` (exact count), `0.65` (variance fraction) or `"mle"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NComponents {
    Count(usize),
    VarianceRatio(f64),
    Policy(ComponentPolicy),
}

/// Named component-selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPolicy {
    /// Minka's maximum-likelihood estimate of the intrinsic dimension.
    Mle,
}

impl Default for NComponents {
    fn default() -> Self {
        Self::VarianceRatio(DEFAULT_VARIANCE_RETAINED)
    }
}

impl NComponents {
    /// Reject settings that can never be satisfied, independent of the data.
    pub fn validate(&self) -> Result<(), DriftError> {
        match *self {
            Self::Count(0) => Err(DriftError::config("n_components must be at least 1")),
            Self::VarianceRatio(r) if !(r > 0.0 && r < 1.0) => Err(DriftError::config(format!(
                "n_components as a variance fraction must lie strictly between 0 and 1, got {r}"
            ))),
            _ => Ok(()),
        }
    }
}

/// A fitted linear subspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    /// Per-feature mean of the fitting data.
    pub mean: Array1<f64>,
    /// Principal axes, one per row (`n_components x n_features`).
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
}

impl PcaModel {
    /// Fit on `x` (`n_samples x n_features`).
    pub fn fit(x: &Array2<f64>, n_components: NComponents) -> Result<Self, DriftError> {
        n_components.validate()?;
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(DriftError::invalid_input(format!(
                "cannot fit reduction model on a {n_samples}x{n_features} matrix"
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let eig = symmetric_eigen(&covariance(x, &mean))?;
        let spectrum = eig.values.mapv(|v| v.max(0.0));
        let total: f64 = spectrum.sum();
        let ratio = if total > 0.0 {
            &spectrum / total
        } else {
            Array1::zeros(n_features)
        };

        let max_components = n_samples.min(n_features);
        let k = match n_components {
            NComponents::Count(k) => {
                if k > max_components {
                    return Err(DriftError::config(format!(
                        "n_components={k} must be between 1 and min(n_samples, n_features)={max_components}"
                    )));
                }
                k
            }
            NComponents::VarianceRatio(target) => {
                let mut cumulative = 0.0;
                let below = ratio
                    .iter()
                    .take_while(|r| {
                        cumulative += **r;
                        cumulative <= target
                    })
                    .count();
                (below + 1).min(max_components)
            }
            NComponents::Policy(ComponentPolicy::Mle) => {
                if n_samples < n_features {
                    return Err(DriftError::config(format!(
                        "n_components='mle' requires at least as many rows as features ({n_samples} < {n_features})"
                    )));
                }
                infer_dimension(spectrum.as_slice().unwrap_or(&[]), n_samples).max(1)
            }
        };

        tracing::debug!(
            n_samples,
            n_features,
            n_components = k,
            explained = ratio.slice(s![..k]).sum(),
            "fitted reduction model"
        );

        Ok(Self {
            mean,
            components: eig.vectors.slice(s![.., ..k]).t().to_owned(),
            explained_variance: spectrum.slice(s![..k]).to_owned(),
            explained_variance_ratio: ratio.slice(s![..k]).to_owned(),
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    /// Map feature rows into subspace coordinates.
    pub fn project(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean).dot(&self.components.t())
    }

    /// Map subspace coordinates back into feature space.
    pub fn reconstruct(&self, z: &Array2<f64>) -> Array2<f64> {
        z.dot(&self.components) + &self.mean
    }
}

/// Log-likelihood of keeping `rank` components given the eigenvalue spectrum.
fn assess_dimension(spectrum: &[f64], rank: usize, n_samples: usize) -> f64 {
    const EPS: f64 = 1e-15;
    let n_features = spectrum.len();
    let n = n_samples as f64;
    let pi = std::f64::consts::PI;

    if spectrum[rank - 1] < EPS {
        return f64::NEG_INFINITY;
    }

    let mut pu = -(rank as f64) * 2f64.ln();
    for i in 1..=rank {
        let half = (n_features - i + 1) as f64 / 2.0;
        pu += ln_gamma(half) - pi.ln() * half;
    }

    let pl = -spectrum[..rank].iter().map(|v| v.ln()).sum::<f64>() * n / 2.0;

    let v = (spectrum[rank..].iter().sum::<f64>() / (n_features - rank) as f64).max(EPS);
    let pv = -v.ln() * n * (n_features - rank) as f64 / 2.0;

    let m = (n_features * rank) as f64 - (rank * (rank + 1)) as f64 / 2.0;
    let pp = (2.0 * pi).ln() * (m + rank as f64) / 2.0;

    let mut tail = spectrum.to_vec();
    for t in tail.iter_mut().skip(rank) {
        *t = v;
    }
    let mut pa = 0.0;
    for i in 0..rank {
        for j in (i + 1)..n_features {
            pa += ((spectrum[i] - spectrum[j]) * (1.0 / tail[j] - 1.0 / tail[i])).ln() + n.ln();
        }
    }

    pu + pl + pv + pp - pa / 2.0 - rank as f64 * n.ln() / 2.0
}

/// Rank maximizing [`assess_dimension`]; 0 when no rank has finite likelihood.
fn infer_dimension(spectrum: &[f64], n_samples: usize) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for rank in 1..spectrum.len() {
        let ll = assess_dimension(spectrum, rank, n_samples);
        if ll > best.1 {
            best = (rank, ll);
        }
    }
    best.0
}

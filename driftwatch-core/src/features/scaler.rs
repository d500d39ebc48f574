//! Per-feature standardization.

use ndarray::{Array1, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaling learned from reference columns.
///
/// Uses the population standard deviation; constant columns keep a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n_features = x.ncols();
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform_inplace(&self, x: &mut Array2<f64>) {
        for mut row in x.rows_mut() {
            Zip::from(&mut row)
                .and(&self.mean)
                .and(&self.scale)
                .for_each(|v, &m, &s| *v = (*v - m) / s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let mut x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.mean, array![2.0, 5.0]);
        assert_eq!(scaler.scale, array![1.0, 1.0]);
        scaler.transform_inplace(&mut x);
        assert_eq!(x, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_population_std() {
        let x = array![[0.0], [2.0], [4.0], [6.0]];
        let scaler = StandardScaler::fit(&x);
        assert!((scaler.scale[0] - 5f64.sqrt()).abs() < 1e-12);
    }
}

//! Dense linear algebra needed by the reduction model, backed by `nalgebra`.

use crate::error::DriftError;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

const MAX_ITERATIONS: usize = 10_000;

/// Eigen-decomposition of a symmetric matrix.
///
/// Eigenvalues are sorted in descending order; column `k` of `vectors` is the
/// unit eigenvector for `values[k]`, with its largest-magnitude entry positive.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

/// Eigen-decompose a symmetric matrix.
///
/// Ties keep nalgebra's order (stable sort), so the result is deterministic for a given input.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<SymmetricEigen, DriftError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(DriftError::invalid_input(format!(
            "eigen-decomposition needs a square matrix, got {rows}x{cols}"
        )));
    }
    if matrix.iter().any(|x| !x.is_finite()) {
        return Err(DriftError::invalid_input(
            "eigen-decomposition input contains non-finite values",
        ));
    }

    let dense = DMatrix::from_fn(rows, cols, |i, j| matrix[[i, j]]);
    let eig = dense
        .try_symmetric_eigen(f64::EPSILON, MAX_ITERATIONS)
        .ok_or_else(|| {
            DriftError::invalid_input(format!(
                "eigen-decomposition did not converge in {MAX_ITERATIONS} iterations"
            ))
        })?;

    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[j].total_cmp(&eig.eigenvalues[i]));

    let values = Array1::from_iter(order.iter().map(|&i| eig.eigenvalues[i]));
    let mut vectors = Array2::from_shape_fn((rows, rows), |(r, c)| eig.eigenvectors[(r, order[c])]);
    for mut column in vectors.columns_mut() {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            column.mapv_inplace(|x| -x);
        }
    }

    Ok(SymmetricEigen { values, vectors })
}

/// Sample covariance of the columns of `x` (n - 1 denominator) after centering by `mean`.
pub fn covariance(x: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let centered = x - mean;
    let denom = (x.nrows().max(2) - 1) as f64;
    centered.t().dot(&centered) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_eigen_of_diagonal_matrix_is_sorted() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let eig = symmetric_eigen(&m).unwrap();
        assert_close(&eig.values.to_vec(), &[3.0, 2.0, 1.0]);
        assert_close(&eig.vectors.column(0).to_vec(), &[0.0, 1.0, 0.0]);
        assert_close(&eig.vectors.column(1).to_vec(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_eigen_reconstructs_matrix() {
        let m = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let eig = symmetric_eigen(&m).unwrap();
        let lambda = Array2::from_diag(&eig.values);
        let rebuilt = eig.vectors.dot(&lambda).dot(&eig.vectors.t());
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        let identity = eig.vectors.t().dot(&eig.vectors);
        for ((i, j), x) in identity.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((x - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_eigen_sign_convention() {
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let eig = symmetric_eigen(&m).unwrap();
        assert!((eig.values[0] - 3.0).abs() < 1e-9);
        assert!((eig.values[1] - 1.0).abs() < 1e-9);
        for column in eig.vectors.columns() {
            let pivot = column
                .iter()
                .copied()
                .fold(0.0_f64, |b, x| if x.abs() > b.abs() { x } else { b });
            assert!(pivot > 0.0);
        }
    }

    #[test]
    fn test_eigen_is_repeatable() {
        let m = array![[5.0, 2.0, 1.0], [2.0, 4.0, 0.5], [1.0, 0.5, 3.0]];
        let first = symmetric_eigen(&m).unwrap();
        let second = symmetric_eigen(&m).unwrap();
        assert_eq!(first.values, second.values);
        assert_eq!(first.vectors, second.vectors);
    }

    #[test]
    fn test_eigen_rejects_bad_input() {
        let rectangular = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            symmetric_eigen(&rectangular),
            Err(DriftError::InvalidInput(_))
        ));
        let with_nan = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(matches!(
            symmetric_eigen(&with_nan),
            Err(DriftError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_covariance() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
        let mean = array![3.0, 6.0];
        let cov = covariance(&x, &mean);
        assert_eq!(cov, array![[4.0, 8.0], [8.0, 16.0]]);
    }
}

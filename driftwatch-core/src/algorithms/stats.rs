//! Statistical helper functions for drift detection.

use serde::{Deserialize, Serialize};

/// Statistic and p-value of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); NaN for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Natural log of the gamma function (Lanczos approximation, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let mut a = COEFFS[0];
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized upper incomplete gamma function Q(a, x).
pub fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..500 {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * 1e-15 {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

// Modified Lentz evaluation.
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Upper-tail probability of the chi-square distribution.
pub fn chi_square_sf(chi_sq: f64, dof: usize) -> f64 {
    if dof == 0 || chi_sq <= 0.0 {
        return 1.0;
    }
    regularized_gamma_q(dof as f64 / 2.0, chi_sq / 2.0).clamp(0.0, 1.0)
}

/// Approximate p-value for KS statistic using Kolmogorov distribution
pub fn ks_p_value(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    // P(D > d) ≈ 2 * sum_{k=1}^∞ (-1)^{k+1} * exp(-2 * k^2 * λ^2)
    let mut p = 0.0;
    for k in 1..=100 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let term = sign * (-2.0 * f64::from(k).powi(2) * lambda.powi(2)).exp();
        p += term;
        if term.abs() < 1e-10 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Largest `n * m` for which [`ks_2samp`] computes the exact p-value.
pub const KS_EXACT_MAX_CELLS: usize = 1_000_000;

/// Exact two-sided p-value `P(D >= d)` for samples of sizes `n` and `m`.
///
/// Walks the lattice of merged-sample orderings, keeping the probability of
/// paths that stay strictly inside `|i/n - j/m| < d`.
pub fn ks_exact_p_value(d: f64, n: usize, m: usize) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    let bound = (d * n as f64 * m as f64).round() as i64;
    let (n_i, m_i) = (n as i64, m as i64);
    let inside = |i: usize, j: usize| (i as i64 * m_i - j as i64 * n_i).abs() < bound;

    let mut u = vec![0.0_f64; m + 1];
    u[0] = 1.0;
    for j in 1..=m {
        u[j] = if inside(0, j) { u[j - 1] } else { 0.0 };
    }
    for i in 1..=n {
        u[0] = if inside(i, 0) { u[0] } else { 0.0 };
        for j in 1..=m {
            u[j] = if inside(i, j) {
                let total = (i + j) as f64;
                u[j] * i as f64 / total + u[j - 1] * j as f64 / total
            } else {
                0.0
            };
        }
    }
    (1.0 - u[m]).clamp(0.0, 1.0)
}

/// Two-sample Kolmogorov-Smirnov test. NaN values are ignored.
///
/// The p-value is exact while `n * m <= KS_EXACT_MAX_CELLS` and asymptotic above.
/// Either sample being empty yields a NaN statistic and p-value.
pub fn ks_2samp(reference: &[f64], current: &[f64]) -> TestOutcome {
    let mut a: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = current.iter().copied().filter(|v| !v.is_nan()).collect();
    if a.is_empty() || b.is_empty() {
        return TestOutcome {
            statistic: f64::NAN,
            p_value: f64::NAN,
        };
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let p_value = if n * m <= KS_EXACT_MAX_CELLS {
        ks_exact_p_value(d, n, m)
    } else {
        let en = ((n * m) as f64 / (n + m) as f64).sqrt();
        ks_p_value((en + 0.12 + 0.11 / en) * d)
    };
    TestOutcome {
        statistic: d,
        p_value,
    }
}

/// Chi-square test of independence on an observed contingency table.
///
/// `observed[i][j]` is the count of category `i` in sample `j`. Rows and
/// columns summing to zero are dropped. Yates' continuity correction is
/// applied when the table has one degree of freedom.
pub fn chi2_contingency(observed: &[Vec<f64>]) -> TestOutcome {
    let n_cols = observed.first().map(Vec::len).unwrap_or(0);
    let col_totals: Vec<f64> = (0..n_cols)
        .map(|j| observed.iter().map(|row| row[j]).sum())
        .collect();
    let keep_cols: Vec<usize> = (0..n_cols).filter(|&j| col_totals[j] > 0.0).collect();
    let table: Vec<Vec<f64>> = observed
        .iter()
        .filter(|row| row.iter().sum::<f64>() > 0.0)
        .map(|row| keep_cols.iter().map(|&j| row[j]).collect())
        .collect();

    let r = table.len();
    let c = keep_cols.len();
    if r < 2 || c < 2 {
        return TestOutcome {
            statistic: 0.0,
            p_value: 1.0,
        };
    }

    let row_totals: Vec<f64> = table.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..c).map(|j| table.iter().map(|row| row[j]).sum()).collect();
    let total: f64 = row_totals.iter().sum();
    let dof = (r - 1) * (c - 1);

    let mut statistic = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &obs) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / total;
            let obs = if dof == 1 {
                let diff = expected - obs;
                obs + diff.signum() * diff.abs().min(0.5)
            } else {
                obs
            };
            statistic += (obs - expected).powi(2) / expected;
        }
    }

    TestOutcome {
        statistic,
        p_value: chi_square_sf(statistic, dof),
    }
}

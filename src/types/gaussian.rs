//! Gaussian distributions and log-density evaluation
//!
//! The filter produces, for every time step, one Gaussian per trial over the
//! next observed state. All trials of a step share the same covariance, so
//! [`GaussianBatch`] stores a mean per trial and a single covariance matrix.

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use crate::utils::checked_cholesky;
use crate::{LqgError, Result};

// ============================================================================
// Gaussian
// ============================================================================

/// A multivariate Gaussian with mean vector and covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian<T: RealField> {
    /// Mean vector
    pub mean: DVector<T>,
    /// Covariance matrix
    pub covariance: DMatrix<T>,
}

impl<T: RealField + Float + Copy> Gaussian<T> {
    /// Creates a new Gaussian.
    #[inline]
    pub fn new(mean: DVector<T>, covariance: DMatrix<T>) -> Self {
        Self { mean, covariance }
    }

    /// Creates a point mass (zero covariance) at `mean`.
    #[inline]
    pub fn degenerate(mean: DVector<T>) -> Self {
        let n = mean.len();
        Self {
            mean,
            covariance: DMatrix::zeros(n, n),
        }
    }

    /// Returns the dimension of the distribution.
    #[inline]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Restricts the distribution to its first `d` coordinates.
    pub fn marginal_head(&self, d: usize) -> Self {
        Self {
            mean: self.mean.rows(0, d).into_owned(),
            covariance: self.covariance.view((0, 0), (d, d)).into_owned(),
        }
    }

    /// Log-density at `x`.
    ///
    /// Fails with [`LqgError::SingularMatrix`] if the covariance is not
    /// positive definite.
    pub fn log_density(&self, x: &DVector<T>) -> Result<T> {
        if x.len() != self.dim() {
            return Err(LqgError::DimensionMismatch {
                what: "evaluation point",
                expected: self.dim(),
                found: x.len(),
            });
        }
        let residual = DMatrix::from_row_slice(1, self.dim(), (x - &self.mean).as_slice());
        let values = gaussian_log_likelihood(&residual, &self.covariance, T::zero())?;
        Ok(values[0])
    }
}

// ============================================================================
// Gaussian Batch
// ============================================================================

/// One Gaussian per trial, all sharing a covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBatch<T: RealField> {
    /// Means, one row per trial
    pub means: DMatrix<T>,
    /// Covariance shared by every trial
    pub covariance: DMatrix<T>,
}

impl<T: RealField + Float + Copy> GaussianBatch<T> {
    /// Creates a new batch.
    #[inline]
    pub fn new(means: DMatrix<T>, covariance: DMatrix<T>) -> Self {
        Self { means, covariance }
    }

    /// Number of trials in the batch.
    #[inline]
    pub fn n_trials(&self) -> usize {
        self.means.nrows()
    }

    /// Dimension of each distribution.
    #[inline]
    pub fn dim(&self) -> usize {
        self.means.ncols()
    }

    /// Returns the distribution of a single trial.
    pub fn trial(&self, index: usize) -> Gaussian<T> {
        Gaussian {
            mean: self.means.row(index).transpose(),
            covariance: self.covariance.clone(),
        }
    }

    /// Log-density of each row of `values` under the matching trial.
    ///
    /// Pivots whose squared ratio to the largest pivot does not exceed
    /// `tolerance` are treated as singular.
    pub fn log_density(&self, values: &DMatrix<T>, tolerance: T) -> Result<DVector<T>> {
        if values.nrows() != self.n_trials() {
            return Err(LqgError::DimensionMismatch {
                what: "trial count",
                expected: self.n_trials(),
                found: values.nrows(),
            });
        }
        if values.ncols() != self.dim() {
            return Err(LqgError::DimensionMismatch {
                what: "observation",
                expected: self.dim(),
                found: values.ncols(),
            });
        }
        gaussian_log_likelihood(&(values - &self.means), &self.covariance, tolerance)
    }
}

// ============================================================================
// Log-Likelihood Computation
// ============================================================================

/// Computes multivariate Gaussian log-densities of a batch of residuals.
///
/// log p(r) = -0.5 * (d * ln(2π) + ln|S| + r^T * S^{-1} * r)
///
/// `residuals` holds one residual per row; the result holds one
/// log-density per row. The covariance is factorised once with Cholesky.
pub fn gaussian_log_likelihood<T: RealField + Float + Copy>(
    residuals: &DMatrix<T>,
    covariance: &DMatrix<T>,
    tolerance: T,
) -> Result<DVector<T>> {
    let d = covariance.nrows();
    if residuals.ncols() != d {
        return Err(LqgError::DimensionMismatch {
            what: "residual",
            expected: d,
            found: residuals.ncols(),
        });
    }

    let chol = checked_cholesky(covariance, tolerance)?;

    // ln|S| = 2 * sum(ln L_ii)
    let two: T = nalgebra::convert(2.0);
    let log_det = chol
        .l_dirty()
        .diagonal()
        .iter()
        .fold(T::zero(), |acc, &l| acc + two * Float::ln(l));

    // Solve L * Y = R^T, then each column norm is the Mahalanobis distance
    let whitened = chol
        .l()
        .solve_lower_triangular(&residuals.transpose())
        .ok_or(LqgError::SingularMatrix)?;

    let dim: T = nalgebra::convert(d as f64);
    let log_norm = dim * Float::ln(T::two_pi()) + log_det;
    let half: T = nalgebra::convert(0.5);

    Ok(DVector::from_fn(residuals.nrows(), |i, _| {
        -half * (log_norm + whitened.column(i).norm_squared())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_standard_normal_log_density() {
        let g = Gaussian::new(dvector![0.0], dmatrix![1.0]);
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln();
        assert_relative_eq!(g.log_density(&dvector![0.0]).unwrap(), expected, epsilon = 1e-12);
        assert_relative_eq!(
            g.log_density(&dvector![1.0]).unwrap(),
            expected - 0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_diagonal_log_density_factorises() {
        let g = Gaussian::new(dvector![1.0, -2.0], dmatrix![4.0, 0.0; 0.0, 9.0]);
        let x = dvector![2.0, 1.0];

        let g1 = Gaussian::new(dvector![1.0], dmatrix![4.0]);
        let g2 = Gaussian::new(dvector![-2.0], dmatrix![9.0]);
        let expected =
            g1.log_density(&dvector![2.0]).unwrap() + g2.log_density(&dvector![1.0]).unwrap();

        assert_relative_eq!(g.log_density(&x).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_covariance_rejected() {
        let g = Gaussian::new(dvector![0.0, 0.0], dmatrix![1.0, 0.0; 0.0, 0.0]);
        assert_eq!(
            g.log_density(&dvector![0.0, 0.0]),
            Err(LqgError::SingularMatrix)
        );
    }

    #[test]
    fn test_batch_matches_individual() {
        let batch = GaussianBatch::new(
            dmatrix![0.0, 0.0; 1.0, 1.0; -1.0, 2.0],
            dmatrix![2.0, 0.5; 0.5, 1.0],
        );
        let values = dmatrix![0.5, -0.5; 1.0, 3.0; 0.0, 0.0];

        let batched = batch.log_density(&values, 0.0).unwrap();
        for i in 0..batch.n_trials() {
            let single = batch
                .trial(i)
                .log_density(&values.row(i).transpose())
                .unwrap();
            assert_relative_eq!(batched[i], single, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_marginal_head() {
        let g = Gaussian::new(
            dvector![1.0, 2.0, 3.0],
            dmatrix![1.0, 0.1, 0.2; 0.1, 2.0, 0.3; 0.2, 0.3, 3.0],
        );
        let head = g.marginal_head(2);
        assert_eq!(head.mean, dvector![1.0, 2.0]);
        assert_eq!(head.covariance, dmatrix![1.0, 0.1; 0.1, 2.0]);
    }
}

//! Feedback and estimator gain sequences
//!
//! The controller acts with `u_t = -L_t * x̂_t` and corrects its belief with
//! `K_t * (y_{t+1} - ŷ_{t+1})`. Where these gains come from is abstracted by
//! [`GainProvider`]; [`RiccatiGains`] solves the finite-horizon regulator and
//! estimator Riccati recursions.

use nalgebra::{DMatrix, RealField};
use num_traits::Float;

use crate::utils::{expect_shape, is_positive_semidefinite, symmetric_inverse};
use crate::{LqgError, Result};

/// Source of time-indexed feedback and estimator gains.
///
/// Implementations must be deterministic pure functions of their inputs.
/// Both methods return sequences of length `horizon`, indexed by time step:
/// entry `t` is applied at step `t`, i.e. with `horizon - t` steps remaining.
pub trait GainProvider<T: RealField> {
    /// Finite-horizon LQR feedback gains, each `action x state`.
    fn control_law(
        &self,
        a: &DMatrix<T>,
        b: &DMatrix<T>,
        q: &DMatrix<T>,
        r: &DMatrix<T>,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>>;

    /// Finite-horizon Kalman gains, each `state x observation`.
    fn kalman_gain(
        &self,
        a: &DMatrix<T>,
        c: &DMatrix<T>,
        process_cov: &DMatrix<T>,
        obs_cov: &DMatrix<T>,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>>;
}

// ============================================================================
// Gain Schedule
// ============================================================================

/// Feedback gains `L[0..T)` and estimator gains `K[0..T)` for one horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct GainSchedule<T: RealField> {
    /// Feedback gains (action x belief)
    pub feedback: Vec<DMatrix<T>>,
    /// Estimator gains (belief x observation)
    pub estimator: Vec<DMatrix<T>>,
}

impl<T: RealField + Float + Copy> GainSchedule<T> {
    /// Number of time steps covered.
    #[inline]
    pub fn horizon(&self) -> usize {
        self.feedback.len()
    }

    /// Feedback gain at step `t`.
    #[inline]
    pub fn feedback(&self, t: usize) -> &DMatrix<T> {
        &self.feedback[t]
    }

    /// Estimator gain at step `t`.
    #[inline]
    pub fn estimator(&self, t: usize) -> &DMatrix<T> {
        &self.estimator[t]
    }

    /// Checks lengths and gain shapes against the model dimensions.
    pub fn validate(&self, horizon: usize, udim: usize, bdim: usize, ydim: usize) -> Result<()> {
        if self.feedback.len() != horizon {
            return Err(LqgError::DimensionMismatch {
                what: "feedback gain sequence",
                expected: horizon,
                found: self.feedback.len(),
            });
        }
        if self.estimator.len() != horizon {
            return Err(LqgError::DimensionMismatch {
                what: "estimator gain sequence",
                expected: horizon,
                found: self.estimator.len(),
            });
        }
        for l in &self.feedback {
            expect_shape(l, "feedback gain L", udim, bdim)?;
        }
        for k in &self.estimator {
            expect_shape(k, "estimator gain K", bdim, ydim)?;
        }
        Ok(())
    }
}

// ============================================================================
// Riccati Gains
// ============================================================================

/// Finite-horizon LQR and Kalman gains from the discrete Riccati recursions.
#[derive(Debug, Clone)]
pub struct RiccatiGains<T: RealField> {
    /// Tolerance for the symmetric positive-semidefinite checks on costs and
    /// covariances (relative to their largest entry)
    pub psd_tolerance: T,
    /// Singular value cutoff of the pseudo-inverse used when the innovation
    /// covariance is not positive definite
    pub pinv_epsilon: T,
}

impl<T: RealField + Float + Copy> RiccatiGains<T> {
    /// Creates a default configuration.
    pub fn default_config() -> Self {
        Self {
            psd_tolerance: nalgebra::convert(1e-9),
            pinv_epsilon: nalgebra::convert(1e-12),
        }
    }

    /// Creates a configuration with custom tolerances.
    pub fn new(psd_tolerance: T, pinv_epsilon: T) -> Self {
        Self {
            psd_tolerance,
            pinv_epsilon,
        }
    }

    fn check_psd(&self, matrix: &DMatrix<T>) -> Result<()> {
        if is_positive_semidefinite(matrix, self.psd_tolerance) {
            Ok(())
        } else {
            Err(LqgError::NotPositiveSemidefinite)
        }
    }
}

impl<T: RealField + Float + Copy> Default for RiccatiGains<T> {
    fn default() -> Self {
        Self::default_config()
    }
}

impl<T: RealField + Float + Copy> GainProvider<T> for RiccatiGains<T> {
    /// Backward recursion from the terminal cost `P_T = Q`:
    ///
    /// - L_t = (R + B^T * P * B)^{-1} * B^T * P * A
    /// - P   = Q + A^T * P * (A - B * L_t)
    fn control_law(
        &self,
        a: &DMatrix<T>,
        b: &DMatrix<T>,
        q: &DMatrix<T>,
        r: &DMatrix<T>,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>> {
        if horizon == 0 {
            return Err(LqgError::EmptyHorizon);
        }
        let (n, m) = b.shape();
        expect_shape(a, "A", n, n)?;
        expect_shape(q, "Q", n, n)?;
        expect_shape(r, "R", m, m)?;
        self.check_psd(q)?;
        self.check_psd(r)?;

        log::debug!("solving control Riccati recursion over {} steps", horizon);

        let mut p = q.clone();
        let mut gains = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let bt_p = b.transpose() * &p;
            let lhs = r + &bt_p * b;
            let lhs_inv = lhs.try_inverse().ok_or(LqgError::SingularMatrix)?;
            let l = lhs_inv * (&bt_p * a);

            p = q + a.transpose() * &p * (a - b * &l);
            gains.push(l);
        }

        // Computed from the end of the horizon backwards
        gains.reverse();
        Ok(gains)
    }

    /// Forward recursion from an exactly known initial state (`P_0 = 0`):
    ///
    /// - P⁻  = A * P * A^T + Σ_v
    /// - S   = C * P⁻ * C^T + Σ_w
    /// - K_t = P⁻ * C^T * S^{-1}
    /// - P   = (I - K_t * C) * P⁻
    fn kalman_gain(
        &self,
        a: &DMatrix<T>,
        c: &DMatrix<T>,
        process_cov: &DMatrix<T>,
        obs_cov: &DMatrix<T>,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>> {
        if horizon == 0 {
            return Err(LqgError::EmptyHorizon);
        }
        let (y, n) = c.shape();
        expect_shape(a, "A", n, n)?;
        expect_shape(process_cov, "process covariance", n, n)?;
        expect_shape(obs_cov, "observation covariance", y, y)?;
        self.check_psd(process_cov)?;
        self.check_psd(obs_cov)?;

        log::debug!("solving estimator Riccati recursion over {} steps", horizon);

        let identity = DMatrix::<T>::identity(n, n);
        let mut p = DMatrix::<T>::zeros(n, n);
        let mut gains = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let p_pred = a * &p * a.transpose() + process_cov;
            let s = c * &p_pred * c.transpose() + obs_cov;
            let s_inv = symmetric_inverse(&s, self.pinv_epsilon)?;
            let k = &p_pred * c.transpose() * s_inv;

            p = (&identity - &k * c) * &p_pred;
            gains.push(k);
        }

        Ok(gains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    #[test]
    fn test_scalar_control_law_converges() {
        // Scalar DARE with a = b = q = r = 1: P = (1 + sqrt(5)) / 2, L = P / (1 + P)
        let one = dmatrix![1.0];
        let gains = RiccatiGains::default_config()
            .control_law(&one, &one, &one, &one, 50)
            .unwrap();

        assert_eq!(gains.len(), 50);
        let p = (1.0 + 5.0_f64.sqrt()) / 2.0;
        assert_relative_eq!(gains[0][(0, 0)], p / (1.0 + p), epsilon = 1e-9);

        // Last step only sees the terminal cost: L = q / (r + q)
        assert_relative_eq!(gains[49][(0, 0)], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_scalar_kalman_gain() {
        let one = dmatrix![1.0];
        let gains = RiccatiGains::default_config()
            .kalman_gain(&one, &one, &one, &one, 20)
            .unwrap();

        // First step: P⁻ = 1, S = 2, K = 0.5
        assert_relative_eq!(gains[0][(0, 0)], 0.5, epsilon = 1e-12);

        // Steady state: P⁻ solves P⁻ = P⁻ / (1 + P⁻) + 1
        let p = (1.0 + 5.0_f64.sqrt()) / 2.0;
        assert_relative_eq!(gains[19][(0, 0)], p / (1.0 + p), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_noise_gives_zero_kalman_gain() {
        let zero = dmatrix![0.0];
        let gains = RiccatiGains::default_config()
            .kalman_gain(&dmatrix![1.0], &dmatrix![1.0], &zero, &zero, 5)
            .unwrap();
        assert!(gains.iter().all(|k| k[(0, 0)] == 0.0));
    }

    #[test]
    fn test_rejects_indefinite_covariance() {
        let result = RiccatiGains::default_config().kalman_gain(
            &dmatrix![1.0],
            &dmatrix![1.0],
            &dmatrix![-1.0],
            &dmatrix![1.0],
            5,
        );
        assert_eq!(result, Err(LqgError::NotPositiveSemidefinite));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let result = RiccatiGains::default_config().control_law(
            &DMatrix::<f64>::identity(2, 2),
            &dmatrix![0.0; 1.0],
            &DMatrix::identity(3, 3),
            &dmatrix![1.0],
            5,
        );
        assert_eq!(
            result,
            Err(LqgError::ShapeMismatch {
                matrix: "Q",
                expected: (2, 2),
                found: (3, 3),
            })
        );
    }

    #[test]
    fn test_singular_control_cost() {
        let result = RiccatiGains::default_config().control_law(
            &dmatrix![1.0],
            &dmatrix![0.0],
            &dmatrix![1.0],
            &dmatrix![0.0],
            3,
        );
        assert_eq!(result, Err(LqgError::SingularMatrix));
    }

    #[test]
    fn test_empty_horizon() {
        let one = dmatrix![1.0];
        assert_eq!(
            RiccatiGains::default_config().control_law(&one, &one, &one, &one, 0),
            Err(LqgError::EmptyHorizon)
        );
    }

    #[test]
    fn test_schedule_validation() {
        let schedule = GainSchedule {
            feedback: vec![dmatrix![1.0, 2.0]; 3],
            estimator: vec![dmatrix![1.0; 1.0]; 2],
        };
        assert_eq!(
            schedule.validate(3, 1, 2, 1),
            Err(LqgError::DimensionMismatch {
                what: "estimator gain sequence",
                expected: 3,
                found: 2,
            })
        );
    }
}

//! Plant and controller dynamics records
//!
//! Both describe a linear-Gaussian system of the form
//!
//! ```text
//! x_{t+1} = A * x_t + B * u_t + V * ε_t
//! y_t     = C * x_t + W * η_t
//! ```
//!
//! with ε, η standard normal, so the noise covariances are `V * V^T` and
//! `W * W^T`.

use nalgebra::{DMatrix, RealField};
use num_traits::Float;

use crate::models::GainProvider;
use crate::utils::expect_shape;
use crate::Result;

// ============================================================================
// Plant Dynamics
// ============================================================================

/// The true plant: transition, control input, observation and noise shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamics<T: RealField> {
    /// State transition (state x state)
    pub a: DMatrix<T>,
    /// Control input (state x action)
    pub b: DMatrix<T>,
    /// Observation map (observation x state)
    pub c: DMatrix<T>,
    /// Process noise shaping (state x state)
    pub v: DMatrix<T>,
    /// Observation noise shaping (observation x observation)
    pub w: DMatrix<T>,
}

impl<T: RealField + Float + Copy> Dynamics<T> {
    /// Creates plant dynamics from its matrices.
    pub fn new(a: DMatrix<T>, b: DMatrix<T>, c: DMatrix<T>, v: DMatrix<T>, w: DMatrix<T>) -> Self {
        Self { a, b, c, v, w }
    }

    /// State dimension.
    #[inline]
    pub fn xdim(&self) -> usize {
        self.a.nrows()
    }

    /// Action dimension.
    #[inline]
    pub fn udim(&self) -> usize {
        self.b.ncols()
    }

    /// Observation dimension.
    #[inline]
    pub fn ydim(&self) -> usize {
        self.c.nrows()
    }

    /// Process noise covariance `V * V^T`.
    pub fn process_covariance(&self) -> DMatrix<T> {
        &self.v * self.v.transpose()
    }

    /// Observation noise covariance `W * W^T`.
    pub fn observation_covariance(&self) -> DMatrix<T> {
        &self.w * self.w.transpose()
    }

    /// Checks that every matrix agrees with the dimensions implied by `A`,
    /// `B` and `C`.
    pub fn validate(&self) -> Result<()> {
        let (x, u, y) = (self.xdim(), self.udim(), self.ydim());
        expect_shape(&self.a, "plant A", x, x)?;
        expect_shape(&self.b, "plant B", x, u)?;
        expect_shape(&self.c, "plant C", y, x)?;
        expect_shape(&self.v, "plant V", x, x)?;
        expect_shape(&self.w, "plant W", y, y)
    }
}

// ============================================================================
// Controller Dynamics
// ============================================================================

/// The controller's internal model and its quadratic cost.
///
/// `Q` penalises belief-state deviation and `R` control effort; both are only
/// consumed when deriving the feedback gains.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor<T: RealField> {
    /// Internal state transition (belief x belief)
    pub a: DMatrix<T>,
    /// Internal control input (belief x action)
    pub b: DMatrix<T>,
    /// Internal observation map (observation x belief)
    pub c: DMatrix<T>,
    /// Assumed process noise shaping (belief x belief)
    pub v: DMatrix<T>,
    /// Assumed observation noise shaping (observation x observation)
    pub w: DMatrix<T>,
    /// State cost (belief x belief)
    pub q: DMatrix<T>,
    /// Action cost (action x action)
    pub r: DMatrix<T>,
}

impl<T: RealField + Float + Copy> Actor<T> {
    /// Creates a controller from its matrices.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: DMatrix<T>,
        b: DMatrix<T>,
        c: DMatrix<T>,
        v: DMatrix<T>,
        w: DMatrix<T>,
        q: DMatrix<T>,
        r: DMatrix<T>,
    ) -> Self {
        Self { a, b, c, v, w, q, r }
    }

    /// Belief dimension.
    #[inline]
    pub fn bdim(&self) -> usize {
        self.a.nrows()
    }

    /// Assumed process noise covariance `V * V^T`.
    pub fn process_covariance(&self) -> DMatrix<T> {
        &self.v * self.v.transpose()
    }

    /// Assumed observation noise covariance `W * W^T`.
    pub fn observation_covariance(&self) -> DMatrix<T> {
        &self.w * self.w.transpose()
    }

    /// Checks the controller matrices against its belief dimension and the
    /// plant's action and observation dimensions.
    pub fn validate(&self, udim: usize, ydim: usize) -> Result<()> {
        let b = self.bdim();
        expect_shape(&self.a, "actor A", b, b)?;
        expect_shape(&self.b, "actor B", b, udim)?;
        expect_shape(&self.c, "actor C", ydim, b)?;
        expect_shape(&self.v, "actor V", b, b)?;
        expect_shape(&self.w, "actor W", ydim, ydim)?;
        expect_shape(&self.q, "actor Q", b, b)?;
        expect_shape(&self.r, "actor R", udim, udim)
    }

    /// Feedback gains `L[0..horizon)` of the finite-horizon regulator.
    pub fn control_law<P: GainProvider<T>>(
        &self,
        provider: &P,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>> {
        provider.control_law(&self.a, &self.b, &self.q, &self.r, horizon)
    }

    /// Estimator gains `K[0..horizon)` under the assumed noise model.
    pub fn kalman_gain<P: GainProvider<T>>(
        &self,
        provider: &P,
        horizon: usize,
    ) -> Result<Vec<DMatrix<T>>> {
        provider.kalman_gain(
            &self.a,
            &self.c,
            &self.process_covariance(),
            &self.observation_covariance(),
            horizon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LqgError;
    use nalgebra::dmatrix;

    fn plant() -> Dynamics<f64> {
        Dynamics::new(
            DMatrix::identity(2, 2),
            dmatrix![0.0; 0.1],
            DMatrix::identity(2, 2),
            DMatrix::from_diagonal(&nalgebra::dvector![1.0, 0.5]),
            DMatrix::from_diagonal(&nalgebra::dvector![6.0, 3.0]),
        )
    }

    #[test]
    fn test_plant_dimensions() {
        let p = plant();
        assert_eq!((p.xdim(), p.udim(), p.ydim()), (2, 1, 2));
        assert!(p.validate().is_ok());
        assert_eq!(p.process_covariance(), dmatrix![1.0, 0.0; 0.0, 0.25]);
        assert_eq!(p.observation_covariance(), dmatrix![36.0, 0.0; 0.0, 9.0]);
    }

    #[test]
    fn test_plant_shape_mismatch() {
        let mut p = plant();
        p.b = dmatrix![0.0; 0.1; 0.2];
        assert_eq!(
            p.validate(),
            Err(LqgError::ShapeMismatch {
                matrix: "plant B",
                expected: (2, 1),
                found: (3, 1),
            })
        );
    }

    #[test]
    fn test_actor_shape_mismatch() {
        let actor = Actor::new(
            DMatrix::<f64>::identity(2, 2),
            dmatrix![0.0; 0.1],
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            dmatrix![0.5, 0.0; 0.0, 0.5],
        );
        assert_eq!(
            actor.validate(1, 2),
            Err(LqgError::ShapeMismatch {
                matrix: "actor R",
                expected: (1, 1),
                found: (2, 2),
            })
        );
    }
}

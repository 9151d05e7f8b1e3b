//! Recursive moment propagation for exact likelihood evaluation
//!
//! Only the plant state `x` of the augmented state `z = (x, x̂)` is observed.
//! Because `z` is linear-Gaussian, the distribution of each observed state
//! given all earlier ones is Gaussian and can be computed in closed form:
//!
//! 1. Condition the prior on the observed block (a Kalman update whose
//!    observation matrix is the projection onto the first `d` coordinates):
//!    - S = Σ[:d, :d]
//!    - μ = μ + (x_t - μ[:, :d]) * S^{-1} * Σ[:d, :]
//!    - Σ = Σ - Σ[:, :d] * S^{-1} * Σ[:d, :]
//! 2. Predict the next step:
//!    - μ = μ * F_t^T
//!    - Σ = F_t * Σ * F_t^T + G_t * G_t^T
//!
//! The covariance never depends on the observed values, so all trials share
//! one covariance per step and every trial is updated by the same matrix
//! operations.
//!
//! # Example
//!
//! ```
//! use lqg::prelude::*;
//! use nalgebra::dmatrix;
//!
//! let system = System::lqg(
//!     dmatrix![1.0],
//!     dmatrix![1.0],
//!     dmatrix![1.0],
//!     dmatrix![0.5],
//!     dmatrix![1.0],
//!     dmatrix![1.0],
//!     dmatrix![0.1],
//! )
//! .unwrap();
//!
//! let states = system.simulate_seeded(1, 3, 20, None).unwrap().states;
//! let moments = system.conditional_moments(&states, None).unwrap();
//! assert_eq!(moments.len(), 21);
//! assert_eq!(moments.predicted[0].mean.shape(), (3, 2));
//! ```

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use crate::models::{AugmentedTransition, GainProvider, System};
use crate::types::gaussian::{Gaussian, GaussianBatch};
use crate::types::trajectory::TimeSeries;
use crate::utils::{checked_cholesky, max_abs};
use crate::{LqgError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Numerical thresholds of the filter.
#[derive(Debug, Clone)]
pub struct FilterConfig<T: RealField> {
    /// Squared pivot ratio of the observed-block Cholesky factor at or below
    /// which the block is rejected as singular
    pub singular_tolerance: T,
    /// Observed-block covariances whose largest entry is at or below this
    /// value are treated as deterministic
    pub deterministic_tolerance: T,
}

impl<T: RealField + Float> FilterConfig<T> {
    /// Creates a default configuration.
    pub fn default_config() -> Self {
        Self {
            singular_tolerance: nalgebra::convert(1e-12),
            deterministic_tolerance: T::zero(),
        }
    }

    /// Creates a configuration with custom thresholds.
    pub fn new(singular_tolerance: T, deterministic_tolerance: T) -> Self {
        Self {
            singular_tolerance,
            deterministic_tolerance,
        }
    }
}

impl<T: RealField + Float> Default for FilterConfig<T> {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================================
// Joint Moments
// ============================================================================

/// Mean and covariance of the augmented state for every trial.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMoments<T: RealField> {
    /// Means, one row per trial, (plant, belief) columns
    pub mean: DMatrix<T>,
    /// Covariance shared by every trial
    pub covariance: DMatrix<T>,
}

impl<T: RealField + Float + Copy> JointMoments<T> {
    /// Creates joint moments.
    #[inline]
    pub fn new(mean: DMatrix<T>, covariance: DMatrix<T>) -> Self {
        Self { mean, covariance }
    }

    /// Distribution of the first `d` (observed) coordinates.
    pub fn observed(&self, d: usize) -> GaussianBatch<T> {
        GaussianBatch::new(
            self.mean.columns(0, d).into_owned(),
            self.covariance.view((0, 0), (d, d)).into_owned(),
        )
    }

    /// Trace of the covariance (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }
}

/// Filtered and one-step-ahead predicted moments of an observed trajectory.
///
/// For an observed series of `N` steps, `filtered[t]` is conditioned on
/// `x_0..=x_t` and `predicted[t]` is the distribution of step `t + 1` given
/// the same observations.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalMoments<T: RealField> {
    /// Posterior moments after conditioning on step `t`
    pub filtered: Vec<JointMoments<T>>,
    /// Predicted moments of step `t + 1`
    pub predicted: Vec<JointMoments<T>>,
}

impl<T: RealField + Float + Copy> ConditionalMoments<T> {
    /// Number of time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    /// Returns true if no step was processed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Predicted means, one matrix per step.
    pub fn means(&self) -> impl Iterator<Item = &DMatrix<T>> {
        self.predicted.iter().map(|m| &m.mean)
    }

    /// Predicted covariances, one matrix per step.
    pub fn covariances(&self) -> impl Iterator<Item = &DMatrix<T>> {
        self.predicted.iter().map(|m| &m.covariance)
    }
}

// ============================================================================
// Recursive Filter
// ============================================================================

/// Propagates the moments of the augmented state of a [`System`].
///
/// Holds no state between calls; every call is a fresh left-to-right scan.
#[derive(Debug, Clone)]
pub struct RecursiveFilter<'a, T: RealField, P> {
    system: &'a System<T, P>,
    config: FilterConfig<T>,
}

impl<'a, T, P> RecursiveFilter<'a, T, P>
where
    T: RealField + Float + Copy,
    P: GainProvider<T>,
{
    /// Creates a filter with the default configuration.
    pub fn new(system: &'a System<T, P>) -> Self {
        Self::with_config(system, FilterConfig::default_config())
    }

    /// Creates a filter with explicit thresholds.
    pub fn with_config(system: &'a System<T, P>, config: FilterConfig<T>) -> Self {
        Self { system, config }
    }

    /// The filter configuration.
    #[inline]
    pub fn config(&self) -> &FilterConfig<T> {
        &self.config
    }

    /// Conditions on each observed step and predicts the next one.
    ///
    /// `observed` holds plant states, `N` steps x `n` trials x state dim.
    /// Gains are computed for a horizon of `N`. The prior mean defaults to
    /// zero and the prior covariance is `G_0 * G_0^T`.
    ///
    /// # Errors
    /// - [`LqgError::DimensionMismatch`] if the data or prior mean do not
    ///   match the model
    /// - [`LqgError::SingularMatrix`] if an observed-block covariance is
    ///   singular without being identically zero
    pub fn conditional_moments(
        &self,
        observed: &TimeSeries<T>,
        prior_mean: Option<&DMatrix<T>>,
    ) -> Result<ConditionalMoments<T>> {
        let d = self.system.xdim();
        let n = observed.n_trials();
        let dim = self.system.augmented_dim();

        if observed.dim() != d {
            return Err(LqgError::DimensionMismatch {
                what: "observed state",
                expected: d,
                found: observed.dim(),
            });
        }

        let mean = match prior_mean {
            Some(mu0) if mu0.nrows() != n => {
                return Err(LqgError::DimensionMismatch {
                    what: "prior mean trial count",
                    expected: n,
                    found: mu0.nrows(),
                })
            }
            Some(mu0) if mu0.ncols() != dim => {
                return Err(LqgError::DimensionMismatch {
                    what: "prior mean",
                    expected: dim,
                    found: mu0.ncols(),
                })
            }
            Some(mu0) => mu0.clone(),
            None => DMatrix::zeros(n, dim),
        };

        let steps = observed.len();
        let gains = self.system.gains(steps)?;

        log::debug!(
            "propagating moments for {} trials over {} steps (augmented dim {})",
            n,
            steps,
            dim
        );

        let initial = self.system.augmented_transition(&gains, 0);
        let mut prior = JointMoments::new(mean, initial.noise_covariance());

        let mut filtered = Vec::with_capacity(steps);
        let mut predicted = Vec::with_capacity(steps);

        for (t, observation) in observed.frames().iter().enumerate() {
            let posterior = condition(&prior, observation, &self.config).map_err(|e| {
                log::debug!("conditioning failed at step {}: {}", t, e);
                e
            })?;

            let transition = self.system.augmented_transition(&gains, t);
            let next = predict(&posterior, &transition);

            log::trace!(
                "step {}: filtered trace {}, predicted trace {}",
                t,
                posterior.uncertainty(),
                next.uncertainty()
            );

            filtered.push(posterior);
            predicted.push(next.clone());
            prior = next;
        }

        Ok(ConditionalMoments {
            filtered,
            predicted,
        })
    }

    /// Distribution of each next observed state given the steps so far.
    ///
    /// Entry `t` is the Gaussian over step `t + 1` of every trial, built from
    /// the observed block of the predicted moments.
    pub fn conditional_distribution(&self, observed: &TimeSeries<T>) -> Result<Vec<GaussianBatch<T>>> {
        let d = self.system.xdim();
        let moments = self.conditional_moments(observed, None)?;
        Ok(moments.predicted.iter().map(|m| m.observed(d)).collect())
    }

    /// One-step-ahead predictive log-likelihood of each trial.
    ///
    /// For a trajectory of `N + 1` steps, step `t + 1` is scored under the
    /// distribution predicted from steps `0..=t`, for `t` in `0..N`.
    ///
    /// # Errors
    /// [`LqgError::EmptyHorizon`] for fewer than two steps, plus every error
    /// of [`RecursiveFilter::conditional_moments`].
    pub fn log_likelihood_per_trial(&self, trajectory: &TimeSeries<T>) -> Result<DVector<T>> {
        if trajectory.len() < 2 {
            return Err(LqgError::EmptyHorizon);
        }
        let history = trajectory.head(trajectory.len() - 1)?;
        let distributions = self.conditional_distribution(&history)?;

        let mut total = DVector::zeros(trajectory.n_trials());
        for (t, distribution) in distributions.iter().enumerate() {
            total += distribution.log_density(trajectory.frame(t + 1), self.config.singular_tolerance)?;
        }
        Ok(total)
    }

    /// Total one-step-ahead predictive log-likelihood over all trials.
    pub fn log_likelihood(&self, trajectory: &TimeSeries<T>) -> Result<T> {
        Ok(self.log_likelihood_per_trial(trajectory)?.sum())
    }

    /// Unconditioned moments of the augmented state.
    ///
    /// Starts from `(x_0, 0)` with zero covariance and applies the
    /// transition `horizon` times without conditioning, returning the
    /// `horizon + 1` marginals that simulated trials follow.
    pub fn marginal_moments(
        &self,
        horizon: usize,
        initial_state: Option<&DVector<T>>,
    ) -> Result<Vec<Gaussian<T>>> {
        let d = self.system.xdim();
        let dim = self.system.augmented_dim();

        let mut mean = DVector::zeros(dim);
        if let Some(x0) = initial_state {
            if x0.len() != d {
                return Err(LqgError::DimensionMismatch {
                    what: "initial state",
                    expected: d,
                    found: x0.len(),
                });
            }
            mean.rows_mut(0, d).copy_from(x0);
        }

        let gains = self.system.gains(horizon)?;
        let mut current = Gaussian::degenerate(mean);
        let mut marginals = Vec::with_capacity(horizon + 1);

        for t in 0..horizon {
            let transition = self.system.augmented_transition(&gains, t);
            let f = &transition.transition;
            let next = Gaussian::new(
                f * &current.mean,
                f * &current.covariance * f.transpose() + transition.noise_covariance(),
            );
            marginals.push(current);
            current = next;
        }
        marginals.push(current);

        Ok(marginals)
    }
}

// ============================================================================
// Standalone Functions
// ============================================================================

/// Conditions joint moments on an observation of their first coordinates.
///
/// `observation` is `n x d`; the first `d` coordinates of the augmented state
/// are replaced by the data and the rest are corrected through the
/// cross-covariance. An identically zero observed block is deterministic:
/// its cross-covariances vanish too, so only the observed mean changes.
pub fn condition<T: RealField + Float + Copy>(
    prior: &JointMoments<T>,
    observation: &DMatrix<T>,
    config: &FilterConfig<T>,
) -> Result<JointMoments<T>> {
    let d = observation.ncols();
    let block = prior.covariance.view((0, 0), (d, d)).into_owned();

    if max_abs(&block) <= config.deterministic_tolerance {
        let mut mean = prior.mean.clone();
        mean.columns_mut(0, d).copy_from(observation);
        return Ok(JointMoments::new(mean, prior.covariance.clone()));
    }

    let chol = checked_cholesky(&block, config.singular_tolerance)?;

    // S^{-1} * Σ[:d, :]
    let gain_t = chol.solve(&prior.covariance.rows(0, d).into_owned());
    let innovation = observation - prior.mean.columns(0, d).into_owned();

    let mean = &prior.mean + innovation * &gain_t;
    let covariance = &prior.covariance - prior.covariance.columns(0, d) * &gain_t;

    Ok(JointMoments::new(mean, covariance))
}

/// Propagates joint moments through one augmented transition.
pub fn predict<T: RealField + Float + Copy>(
    moments: &JointMoments<T>,
    transition: &AugmentedTransition<T>,
) -> JointMoments<T> {
    let f = &transition.transition;
    JointMoments::new(
        &moments.mean * f.transpose(),
        f * &moments.covariance * f.transpose() + transition.noise_covariance(),
    )
}

// ============================================================================
// Tests
// ============================================================================

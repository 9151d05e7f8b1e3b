//! Trial-batched time series
//!
//! A [`TimeSeries`] is time-major: frame `t` is an `n_trials x dim` matrix
//! whose row `i` belongs to trial `i`. This layout lets the simulator and
//! the filter advance every trial with a single matrix product per step.

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;

use super::gaussian::Gaussian;
use crate::{LqgError, Result};

// ============================================================================
// Time Series
// ============================================================================

/// A sequence of `n_trials x dim` frames, indexed by time step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T: RealField> {
    frames: Vec<DMatrix<T>>,
}

impl<T: RealField + Float + Copy> TimeSeries<T> {
    /// Creates a time series from per-step frames.
    ///
    /// Every frame must have the same shape, with at least one trial.
    pub fn new(frames: Vec<DMatrix<T>>) -> Result<Self> {
        let first = frames.first().ok_or(LqgError::EmptyHorizon)?;
        let (n, d) = first.shape();
        if n == 0 {
            return Err(LqgError::EmptyBatch);
        }

        for frame in &frames {
            if frame.nrows() != n {
                return Err(LqgError::DimensionMismatch {
                    what: "frame trial count",
                    expected: n,
                    found: frame.nrows(),
                });
            }
            if frame.ncols() != d {
                return Err(LqgError::DimensionMismatch {
                    what: "frame dimension",
                    expected: d,
                    found: frame.ncols(),
                });
            }
        }

        Ok(Self { frames })
    }

    /// Creates a time series from per-trial sequences of vectors.
    ///
    /// `trials[i][t]` becomes row `i` of frame `t`. All trials must have the
    /// same length and vector dimension.
    pub fn from_trials(trials: &[Vec<DVector<T>>]) -> Result<Self> {
        let first = trials.first().ok_or(LqgError::EmptyBatch)?;
        let steps = first.len();
        let d = first.first().map(|v| v.len()).ok_or(LqgError::EmptyHorizon)?;

        for trial in trials {
            if trial.len() != steps {
                return Err(LqgError::DimensionMismatch {
                    what: "trial length",
                    expected: steps,
                    found: trial.len(),
                });
            }
            if let Some(v) = trial.iter().find(|v| v.len() != d) {
                return Err(LqgError::DimensionMismatch {
                    what: "trial vector",
                    expected: d,
                    found: v.len(),
                });
            }
        }

        let frames = (0..steps)
            .map(|t| DMatrix::from_fn(trials.len(), d, |i, j| trials[i][t][j]))
            .collect();
        Self::new(frames)
    }

    /// Wraps frames already known to be consistent.
    pub(crate) fn from_frames(frames: Vec<DMatrix<T>>) -> Self {
        debug_assert!(!frames.is_empty());
        Self { frames }
    }

    /// Number of time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; a time series holds at least one step.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of trials.
    #[inline]
    pub fn n_trials(&self) -> usize {
        self.frames[0].nrows()
    }

    /// Dimension of each per-trial vector.
    #[inline]
    pub fn dim(&self) -> usize {
        self.frames[0].ncols()
    }

    /// Shape as `(steps, trials, dim)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.len(), self.n_trials(), self.dim())
    }

    /// Frame at time step `t`.
    ///
    /// # Panics
    /// Panics if `t` is out of bounds.
    #[inline]
    pub fn frame(&self, t: usize) -> &DMatrix<T> {
        &self.frames[t]
    }

    /// All frames in time order.
    #[inline]
    pub fn frames(&self) -> &[DMatrix<T>] {
        &self.frames
    }

    /// Value of component `k` of trial `trial` at step `t`.
    #[inline]
    pub fn get(&self, t: usize, trial: usize, k: usize) -> T {
        self.frames[t][(trial, k)]
    }

    /// The sequence of vectors of a single trial.
    pub fn trial(&self, index: usize) -> Vec<DVector<T>> {
        self.frames
            .iter()
            .map(|frame| frame.row(index).transpose())
            .collect()
    }

    /// The first `steps` time steps.
    ///
    /// Fails with [`LqgError::EmptyHorizon`] if `steps` is zero or exceeds
    /// the length of the series.
    pub fn head(&self, steps: usize) -> Result<Self> {
        if steps == 0 || steps > self.len() {
            return Err(LqgError::EmptyHorizon);
        }
        Ok(Self {
            frames: self.frames[..steps].to_vec(),
        })
    }

    /// Returns true if every value is finite.
    pub fn is_finite(&self) -> bool {
        self.frames
            .iter()
            .all(|frame| frame.iter().all(|v| Float::is_finite(*v)))
    }

    /// Sample mean and covariance across trials at step `t`.
    ///
    /// The covariance uses the unbiased `n - 1` normalisation and is zero
    /// for a single trial.
    pub fn empirical_moments(&self, t: usize) -> Gaussian<T> {
        let frame = &self.frames[t];
        let (n, d) = frame.shape();
        let count: T = nalgebra::convert(n as f64);

        let mean = DVector::from_fn(d, |j, _| frame.column(j).sum() / count);
        if n < 2 {
            return Gaussian::degenerate(mean);
        }

        let centered = DMatrix::from_fn(n, d, |i, j| frame[(i, j)] - mean[j]);
        let dof: T = nalgebra::convert((n - 1) as f64);
        let covariance = (centered.transpose() * &centered) / dof;

        Gaussian::new(mean, covariance)
    }
}

// ============================================================================
// Rollout
// ============================================================================

/// All sequences produced by one batch of simulated trials.
///
/// With horizon `T`: states, beliefs and observations have `T + 1` steps
/// (step 0 holds the initial condition), actions have `T` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout<T: RealField> {
    /// Plant states `x_t`
    pub states: TimeSeries<T>,
    /// Controller beliefs `x̂_t`
    pub beliefs: TimeSeries<T>,
    /// Observations `y_t`
    pub observations: TimeSeries<T>,
    /// Actions `u_t`
    pub actions: TimeSeries<T>,
}

impl<T: RealField + Float + Copy> Rollout<T> {
    /// Number of simulated transitions.
    #[inline]
    pub fn horizon(&self) -> usize {
        self.actions.len()
    }

    /// Number of trials.
    #[inline]
    pub fn n_trials(&self) -> usize {
        self.states.n_trials()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_from_trials_layout() {
        let trials = vec![
            vec![dvector![1.0, 2.0], dvector![3.0, 4.0], dvector![5.0, 6.0]],
            vec![dvector![-1.0, -2.0], dvector![-3.0, -4.0], dvector![-5.0, -6.0]],
        ];
        let series = TimeSeries::from_trials(&trials).unwrap();

        assert_eq!(series.shape(), (3, 2, 2));
        assert_eq!(series.frame(1), &dmatrix![3.0, 4.0; -3.0, -4.0]);
        assert_eq!(series.get(2, 1, 0), -5.0);
        assert_eq!(series.trial(0), trials[0]);
    }

    #[test]
    fn test_inconsistent_frames_rejected() {
        let frames = vec![DMatrix::<f64>::zeros(2, 3), DMatrix::zeros(2, 2)];
        assert_eq!(
            TimeSeries::new(frames),
            Err(LqgError::DimensionMismatch {
                what: "frame dimension",
                expected: 3,
                found: 2,
            })
        );

        assert_eq!(
            TimeSeries::<f64>::new(Vec::new()),
            Err(LqgError::EmptyHorizon)
        );
        assert_eq!(
            TimeSeries::new(vec![DMatrix::<f64>::zeros(0, 2)]),
            Err(LqgError::EmptyBatch)
        );
    }

    #[test]
    fn test_head() {
        let frames = (0..4).map(|t| DMatrix::from_element(1, 1, t as f64)).collect();
        let series = TimeSeries::new(frames).unwrap();

        let head = series.head(3).unwrap();
        assert_eq!(head.len(), 3);
        assert_eq!(head.get(2, 0, 0), 2.0);
        assert!(series.head(0).is_err());
        assert!(series.head(5).is_err());
    }

    #[test]
    fn test_empirical_moments() {
        let frame = dmatrix![1.0, 0.0; 3.0, 2.0; 5.0, 1.0];
        let series = TimeSeries::new(vec![frame]).unwrap();

        let moments = series.empirical_moments(0);
        assert_relative_eq!(moments.mean[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(moments.mean[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moments.covariance[(0, 0)], 4.0, epsilon = 1e-12);
        assert_relative_eq!(moments.covariance[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(moments.covariance[(0, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_is_finite() {
        let series = TimeSeries::new(vec![dmatrix![1.0, f64::NAN]]).unwrap();
        assert!(!series.is_finite());
    }
}

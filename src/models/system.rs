//! Closed-loop system: plant, controller and the augmented transition
//!
//! The plant state `x` and the controller belief `x̂` evolve jointly as a
//! linear-Gaussian process `z_{t+1} = F_t * z_t + G_t * w_t` with
//! `z = (x, x̂)` and `w = (ε, η)` standard normal. Both the simulator and the
//! moment-propagating filter are built on this structure.

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::filters::moments::{ConditionalMoments, RecursiveFilter};
use crate::models::{Actor, Dynamics, GainProvider, GainSchedule, RiccatiGains};
use crate::simulation::TrajectorySimulator;
use crate::types::gaussian::GaussianBatch;
use crate::types::trajectory::{Rollout, TimeSeries};
use crate::utils::block2x2;
use crate::Result;

// ============================================================================
// Augmented Transition
// ============================================================================

/// One-step transition of the augmented (plant, belief) state.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedTransition<T: RealField> {
    /// Transition matrix `F_t`, (x + b) x (x + b)
    pub transition: DMatrix<T>,
    /// Noise shaping `G_t`, (x + b) x (x + y)
    pub noise_gain: DMatrix<T>,
}

impl<T: RealField + Float + Copy> AugmentedTransition<T> {
    /// Noise covariance `G_t * G_t^T`.
    pub fn noise_covariance(&self) -> DMatrix<T> {
        &self.noise_gain * self.noise_gain.transpose()
    }
}

// ============================================================================
// System
// ============================================================================

/// A plant controlled by an actor, with the provider of its gains.
///
/// Immutable after construction; simulation and filtering borrow it.
#[derive(Debug, Clone)]
pub struct System<T: RealField, P = RiccatiGains<T>> {
    dynamics: Dynamics<T>,
    actor: Actor<T>,
    provider: P,
}

impl<T: RealField + Float + Copy> System<T> {
    /// Creates a system whose gains come from the Riccati recursions.
    pub fn new(actor: Actor<T>, dynamics: Dynamics<T>) -> Result<Self> {
        Self::with_provider(actor, dynamics, RiccatiGains::default_config())
    }

    /// Creates a system whose controller uses the true plant model.
    #[allow(clippy::too_many_arguments)]
    pub fn lqg(
        a: DMatrix<T>,
        b: DMatrix<T>,
        c: DMatrix<T>,
        v: DMatrix<T>,
        w: DMatrix<T>,
        q: DMatrix<T>,
        r: DMatrix<T>,
    ) -> Result<Self> {
        let dynamics = Dynamics::new(a.clone(), b.clone(), c.clone(), v.clone(), w.clone());
        let actor = Actor::new(a, b, c, v, w, q, r);
        Self::new(actor, dynamics)
    }
}

impl<T, P> System<T, P>
where
    T: RealField + Float + Copy,
    P: GainProvider<T>,
{
    /// Creates a system with an explicit gain provider.
    ///
    /// Fails with [`crate::LqgError::ShapeMismatch`] if any matrix disagrees
    /// with the dimensions derived from plant `A`, `B`, `C` and actor `A`.
    pub fn with_provider(actor: Actor<T>, dynamics: Dynamics<T>, provider: P) -> Result<Self> {
        dynamics.validate()?;
        actor.validate(dynamics.udim(), dynamics.ydim())?;
        Ok(Self {
            dynamics,
            actor,
            provider,
        })
    }

    /// The plant.
    #[inline]
    pub fn dynamics(&self) -> &Dynamics<T> {
        &self.dynamics
    }

    /// The controller.
    #[inline]
    pub fn actor(&self) -> &Actor<T> {
        &self.actor
    }

    /// The gain provider.
    #[inline]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// State dimensionality.
    #[inline]
    pub fn xdim(&self) -> usize {
        self.dynamics.xdim()
    }

    /// Belief dimensionality.
    #[inline]
    pub fn bdim(&self) -> usize {
        self.actor.bdim()
    }

    /// Action dimensionality.
    #[inline]
    pub fn udim(&self) -> usize {
        self.dynamics.udim()
    }

    /// Observation dimensionality.
    #[inline]
    pub fn ydim(&self) -> usize {
        self.dynamics.ydim()
    }

    /// Dimensionality of the augmented (plant, belief) state.
    #[inline]
    pub fn augmented_dim(&self) -> usize {
        self.xdim() + self.bdim()
    }

    /// Feedback and estimator gains for a horizon of `horizon` steps.
    pub fn gains(&self, horizon: usize) -> Result<GainSchedule<T>> {
        let schedule = GainSchedule {
            feedback: self.actor.control_law(&self.provider, horizon)?,
            estimator: self.actor.kalman_gain(&self.provider, horizon)?,
        };
        schedule.validate(horizon, self.udim(), self.bdim(), self.ydim())?;
        Ok(schedule)
    }

    /// Builds `F_t` and `G_t` from the gains at step `t`.
    ///
    /// With `M = A_c - B_c * L`:
    ///
    /// ```text
    /// F = | A                 -B * L                          |
    ///     | K * C * A          M - K * C_c * M - K * C * B * L |
    ///
    /// G = | V                  0      |
    ///     | K * C * V          K * W  |
    /// ```
    ///
    /// where unsubscripted matrices belong to the plant and `_c` to the
    /// actor. The belief block reduces to `A_c - B_c * L - K * C_c * A_c`
    /// whenever `C_c * B_c = C * B`.
    ///
    /// # Panics
    /// Panics if `t` is outside the schedule's horizon.
    pub fn augmented_transition(&self, gains: &GainSchedule<T>, t: usize) -> AugmentedTransition<T> {
        let plant = &self.dynamics;
        let actor = &self.actor;
        let l = gains.feedback(t);
        let k = gains.estimator(t);

        let bl = &plant.b * l;
        let kc = k * &plant.c;
        let m = &actor.a - &actor.b * l;

        let belief_from_plant = &kc * &plant.a;
        let belief_from_belief = &m - k * &actor.c * &m - &kc * &bl;

        let transition = block2x2(&plant.a, &(-&bl), &belief_from_plant, &belief_from_belief);
        let noise_gain = block2x2(
            &plant.v,
            &DMatrix::zeros(self.xdim(), self.ydim()),
            &(&kc * &plant.v),
            &(k * &plant.w),
        );

        AugmentedTransition {
            transition,
            noise_gain,
        }
    }

    /// A filter over this system with the default configuration.
    pub fn filter(&self) -> RecursiveFilter<'_, T, P> {
        RecursiveFilter::new(self)
    }

    /// A simulator over this system.
    pub fn simulator(&self) -> TrajectorySimulator<'_, T, P> {
        TrajectorySimulator::new(self)
    }

    /// Simulates `n_trials` independent trials; see [`TrajectorySimulator::simulate`].
    pub fn simulate<R: Rng + SeedableRng>(
        &self,
        rng: &mut R,
        n_trials: usize,
        horizon: usize,
        initial_state: Option<&DVector<T>>,
    ) -> Result<Rollout<T>>
    where
        StandardNormal: Distribution<T>,
    {
        self.simulator()
            .simulate(rng, n_trials, horizon, initial_state)
    }

    /// Simulates from a seed; see [`TrajectorySimulator::simulate_seeded`].
    pub fn simulate_seeded(
        &self,
        seed: u64,
        n_trials: usize,
        horizon: usize,
        initial_state: Option<&DVector<T>>,
    ) -> Result<Rollout<T>>
    where
        StandardNormal: Distribution<T>,
    {
        self.simulator()
            .simulate_seeded(seed, n_trials, horizon, initial_state)
    }

    /// Filtered and predicted moments; see [`RecursiveFilter::conditional_moments`].
    pub fn conditional_moments(
        &self,
        observed: &TimeSeries<T>,
        prior_mean: Option<&DMatrix<T>>,
    ) -> Result<ConditionalMoments<T>> {
        self.filter().conditional_moments(observed, prior_mean)
    }

    /// Next-step distributions; see [`RecursiveFilter::conditional_distribution`].
    pub fn conditional_distribution(&self, observed: &TimeSeries<T>) -> Result<Vec<GaussianBatch<T>>> {
        self.filter().conditional_distribution(observed)
    }

    /// Total log-likelihood; see [`RecursiveFilter::log_likelihood`].
    pub fn log_likelihood(&self, trajectory: &TimeSeries<T>) -> Result<T> {
        self.filter().log_likelihood(trajectory)
    }
}

//! Trajectory simulator
//!
//! Per time step, for every trial:
//!
//! ```text
//! u_t     = -L_t * x̂_t
//! x_{t+1} = A * x_t + B * u_t + V * ε_t
//! y_{t+1} = C * x_{t+1} + W * η_{t+1}
//! x̄       = A_c * x̂_t + B_c * u_t
//! x̂_{t+1} = x̄ + K_t * (y_{t+1} - C_c * x̄)
//! ```

use nalgebra::{DMatrix, DVector, RealField};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::models::{GainProvider, GainSchedule, System};
use crate::types::trajectory::{Rollout, TimeSeries};
use crate::utils::max_abs;
use crate::{LqgError, Result};

/// Standard normal innovations of one trial.
struct TrialNoise<T: RealField> {
    /// Process innovations ε, horizon x state
    process: DMatrix<T>,
    /// Observation innovations η, (horizon + 1) x observation
    observation: DMatrix<T>,
}

impl<T: RealField + Float + Copy> TrialNoise<T> {
    fn draw<R: Rng>(rng: &mut R, horizon: usize, xdim: usize, ydim: usize) -> Self
    where
        StandardNormal: Distribution<T>,
    {
        let process = DMatrix::from_fn(horizon, xdim, |_, _| rng.sample(StandardNormal));
        let observation = DMatrix::from_fn(horizon + 1, ydim, |_, _| rng.sample(StandardNormal));
        Self {
            process,
            observation,
        }
    }
}

/// Running plant states and beliefs of all trials.
struct Carry<T: RealField> {
    states: DMatrix<T>,
    beliefs: DMatrix<T>,
}

/// Collected per-step frames.
struct Frames<T: RealField> {
    states: Vec<DMatrix<T>>,
    beliefs: Vec<DMatrix<T>>,
    observations: Vec<DMatrix<T>>,
    actions: Vec<DMatrix<T>>,
}

/// Simulates batches of closed-loop trials of a [`System`].
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySimulator<'a, T: RealField, P> {
    system: &'a System<T, P>,
}

impl<'a, T, P> TrajectorySimulator<'a, T, P>
where
    T: RealField + Float + Copy,
    P: GainProvider<T>,
{
    /// Creates a simulator borrowing `system`.
    pub fn new(system: &'a System<T, P>) -> Self {
        Self { system }
    }

    /// Simulates `n_trials` independent trials over `horizon` transitions.
    ///
    /// The initial plant state defaults to zero and the initial belief is
    /// always zero. One child generator per trial is split off `rng` in
    /// trial order, so equal generator states give bit-identical rollouts.
    ///
    /// # Errors
    /// - [`LqgError::EmptyBatch`] / [`LqgError::EmptyHorizon`] for zero trials or steps
    /// - [`LqgError::DimensionMismatch`] if `initial_state` has the wrong length
    /// - any error of the gain provider
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
        if n_trials == 0 {
            return Err(LqgError::EmptyBatch);
        }
        if horizon == 0 {
            return Err(LqgError::EmptyHorizon);
        }
        let xdim = self.system.xdim();
        let initial_state = match initial_state {
            Some(x0) if x0.len() != xdim => {
                return Err(LqgError::DimensionMismatch {
                    what: "initial state",
                    expected: xdim,
                    found: x0.len(),
                })
            }
            Some(x0) => x0.clone(),
            None => DVector::zeros(xdim),
        };

        let gains = self.system.gains(horizon)?;

        log::debug!(
            "simulating {} trials over {} steps (state {}, belief {}, action {})",
            n_trials,
            horizon,
            xdim,
            self.system.bdim(),
            self.system.udim()
        );

        let noise: Vec<TrialNoise<T>> = (0..n_trials)
            .map(|_| {
                let mut trial_rng = R::from_rng(&mut *rng);
                TrialNoise::draw(&mut trial_rng, horizon, xdim, self.system.ydim())
            })
            .collect();

        let frames = self.roll_out(&gains, &noise, &initial_state);

        Ok(Rollout {
            states: TimeSeries::from_frames(frames.states),
            beliefs: TimeSeries::from_frames(frames.beliefs),
            observations: TimeSeries::from_frames(frames.observations),
            actions: TimeSeries::from_frames(frames.actions),
        })
    }

    /// Simulates and returns only the plant states.
    pub fn simulate_states<R: Rng + SeedableRng>(
        &self,
        rng: &mut R,
        n_trials: usize,
        horizon: usize,
        initial_state: Option<&DVector<T>>,
    ) -> Result<TimeSeries<T>>
    where
        StandardNormal: Distribution<T>,
    {
        Ok(self.simulate(rng, n_trials, horizon, initial_state)?.states)
    }

    /// Simulates with a [`StdRng`] seeded from `seed`.
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
        let mut rng = StdRng::seed_from_u64(seed);
        self.simulate(&mut rng, n_trials, horizon, initial_state)
    }

    /// Advances all trials through the horizon, one batched step at a time.
    fn roll_out(
        &self,
        gains: &GainSchedule<T>,
        noise: &[TrialNoise<T>],
        initial_state: &DVector<T>,
    ) -> Frames<T> {
        let plant = self.system.dynamics();
        let actor = self.system.actor();
        let n = noise.len();
        let horizon = gains.horizon();
        let (xdim, bdim, ydim) = (self.system.xdim(), self.system.bdim(), self.system.ydim());

        // Row-vector convention: a batch of states X maps to X * A^T
        let (a_t, b_t, c_t, v_t, w_t) = (
            plant.a.transpose(),
            plant.b.transpose(),
            plant.c.transpose(),
            plant.v.transpose(),
            plant.w.transpose(),
        );
        let (ac_t, bc_t, cc_t) = (actor.a.transpose(), actor.b.transpose(), actor.c.transpose());

        let process_frame =
            |t: usize| DMatrix::from_fn(n, xdim, |i, j| noise[i].process[(t, j)]);
        let observation_frame =
            |t: usize| DMatrix::from_fn(n, ydim, |i, j| noise[i].observation[(t, j)]);

        let mut carry = Carry {
            states: DMatrix::from_fn(n, xdim, |_, j| initial_state[j]),
            beliefs: DMatrix::zeros(n, bdim),
        };

        let mut frames = Frames {
            states: Vec::with_capacity(horizon + 1),
            beliefs: Vec::with_capacity(horizon + 1),
            observations: Vec::with_capacity(horizon + 1),
            actions: Vec::with_capacity(horizon),
        };
        frames.states.push(carry.states.clone());
        frames.beliefs.push(carry.beliefs.clone());
        frames
            .observations
            .push(&carry.states * &c_t + observation_frame(0) * &w_t);

        for t in 0..horizon {
            let actions = -(&carry.beliefs * gains.feedback(t).transpose());

            let states = &carry.states * &a_t + &actions * &b_t + process_frame(t) * &v_t;
            let observations = &states * &c_t + observation_frame(t + 1) * &w_t;

            let predicted = &carry.beliefs * &ac_t + &actions * &bc_t;
            let innovation = &observations - &predicted * &cc_t;
            let beliefs = &predicted + innovation * gains.estimator(t).transpose();

            log::trace!("step {}: max |x| = {}", t, max_abs(&states));

            frames.states.push(states.clone());
            frames.beliefs.push(beliefs.clone());
            frames.observations.push(observations);
            frames.actions.push(actions);

            carry = Carry { states, beliefs };
        }

        frames
    }
}

//! Moment-propagating filter over the augmented (plant, belief) state
//!
//! - `moments`: conditional moments, next-step distributions and the
//!   one-step-ahead predictive log-likelihood of observed state trajectories

pub mod moments;

pub use moments::*;

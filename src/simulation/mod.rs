//! Stochastic rollouts of the closed-loop system
//!
//! Trials are independent and identically distributed. Each trial owns a
//! generator split off the caller's generator, draws all of its noise up
//! front, and is then advanced together with every other trial: row `i` of
//! each per-step matrix belongs to trial `i`.

mod simulator;

pub use simulator::*;

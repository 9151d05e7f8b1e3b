//! Core data types: trial-batched time series and Gaussian distributions

pub mod gaussian;
pub mod trajectory;

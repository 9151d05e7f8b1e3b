//! Common model builders for simulation and likelihood integration tests

#![allow(dead_code)]

use lqg::prelude::*;
use nalgebra::{dmatrix, dvector, DMatrix};

/// Routes `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One-dimensional random walk with a unit actuator and full observation.
pub fn make_scalar_system(v: f64, w: f64) -> System<f64> {
    System::lqg(
        dmatrix![1.0],
        dmatrix![1.0],
        dmatrix![1.0],
        dmatrix![v],
        dmatrix![w],
        dmatrix![1.0],
        dmatrix![0.1],
    )
    .unwrap()
}

/// Point-mass reach at 60 Hz: position and velocity, force input.
pub fn make_reaching_system() -> System<f64> {
    let dt = 1.0 / 60.0;
    System::lqg(
        DMatrix::identity(2, 2),
        dmatrix![0.0; dt],
        DMatrix::identity(2, 2),
        DMatrix::from_diagonal(&dvector![1.0, 0.5]),
        DMatrix::from_diagonal(&dvector![6.0, 3.0]),
        dmatrix![1.0, -1.0; -1.0, 1.0],
        dmatrix![0.5],
    )
    .unwrap()
}

/// Scalar system without process or observation noise.
pub fn make_noise_free_system() -> System<f64> {
    make_scalar_system(0.0, 0.0)
}

/// Damped two-state plant whose controller believes the actuator is three
/// times stronger than it is.
pub fn make_mismatched_system() -> System<f64> {
    let a = dmatrix![1.0, 0.1; 0.0, 0.9];
    let c = DMatrix::identity(2, 2);
    let noise = DMatrix::from_diagonal(&dvector![0.5, 0.5]);

    let dynamics = Dynamics::new(
        a.clone(),
        dmatrix![0.0; 0.5],
        c.clone(),
        noise.clone(),
        noise.clone(),
    );
    let actor = Actor::new(
        a,
        dmatrix![0.0; 1.5],
        c,
        noise.clone(),
        noise,
        DMatrix::identity(2, 2),
        dmatrix![1.0],
    );
    System::new(actor, dynamics).unwrap()
}

/// Reaching model with noise-free observations in plant and controller.
pub fn make_exact_sensor_reaching_system() -> System<f64> {
    let dt = 1.0 / 60.0;
    System::lqg(
        DMatrix::identity(2, 2),
        dmatrix![0.0; dt],
        DMatrix::identity(2, 2),
        DMatrix::from_diagonal(&dvector![1.0, 0.5]),
        DMatrix::zeros(2, 2),
        dmatrix![1.0, -1.0; -1.0, 1.0],
        dmatrix![0.5],
    )
    .unwrap()
}

/// Two-state plant whose second state receives no process noise while the
/// controller believes it does.
pub fn make_partially_driven_system() -> System<f64> {
    let a = dmatrix![1.0, 0.1; 0.0, 1.0];
    let b = dmatrix![0.0; 0.1];
    let c = DMatrix::identity(2, 2);
    let w = DMatrix::identity(2, 2);

    let dynamics = Dynamics::new(
        a.clone(),
        b.clone(),
        c.clone(),
        DMatrix::from_diagonal(&dvector![1.0, 0.0]),
        w.clone(),
    );
    let actor = Actor::new(
        a,
        b,
        c,
        DMatrix::identity(2, 2),
        w,
        DMatrix::identity(2, 2),
        dmatrix![1.0],
    );
    System::new(actor, dynamics).unwrap()
}

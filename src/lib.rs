//! LQG: closed-loop sensorimotor control as a linear-quadratic-Gaussian system
//!
//! A plant is driven by a linear feedback controller that acts on a noisy
//! internal estimate of the plant state. The crate offers two directions over
//! the same model:
//!
//! - **Simulation**: stochastic rollouts of plant state, belief, observation
//!   and action for many independent trials at once.
//! - **Likelihood**: exact one-step-ahead predictive distributions of an
//!   observed state trajectory, obtained by propagating the joint
//!   (plant, belief) Gaussian and conditioning on the observed block.
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
//! let states = system.simulate_seeded(7, 4, 50, None).unwrap().states;
//! assert_eq!(states.shape(), (51, 4, 1));
//!
//! let ll: f64 = system.log_likelihood(&states).unwrap();
//! assert!(ll.is_finite());
//! ```

pub mod filters;
pub mod models;
pub mod simulation;
pub mod types;
pub mod utils;

pub mod prelude {
    pub use crate::filters::moments::*;
    pub use crate::models::*;
    pub use crate::simulation::*;
    pub use crate::types::gaussian::*;
    pub use crate::types::trajectory::*;
    pub use crate::{ErrorKind, LqgError};
}

/// Coarse classification of [`LqgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Matrix shapes are inconsistent with the declared model
    Shape,
    /// Supplied data or initial conditions mismatch the model dimensions
    Dimension,
    /// A matrix that must be invertible or positive (semi)definite is not
    Numerical,
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq)]
pub enum LqgError {
    /// A model matrix does not have the shape implied by the other matrices
    ShapeMismatch {
        matrix: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Data or initial conditions do not match a model dimension
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A horizon of zero steps (or too few steps for the operation)
    EmptyHorizon,
    /// A batch without trials
    EmptyBatch,
    /// Matrix is singular and cannot be inverted
    SingularMatrix,
    /// A covariance matrix is not symmetric positive semidefinite
    NotPositiveSemidefinite,
}

impl LqgError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LqgError::ShapeMismatch { .. } => ErrorKind::Shape,
            LqgError::DimensionMismatch { .. } | LqgError::EmptyHorizon | LqgError::EmptyBatch => {
                ErrorKind::Dimension
            }
            LqgError::SingularMatrix | LqgError::NotPositiveSemidefinite => ErrorKind::Numerical,
        }
    }
}

impl std::error::Error for LqgError {}

impl ::core::fmt::Display for LqgError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            LqgError::ShapeMismatch {
                matrix,
                expected,
                found,
            } => write!(
                f,
                "Matrix {} has shape {}x{}, expected {}x{}",
                matrix, found.0, found.1, expected.0, expected.1
            ),
            LqgError::DimensionMismatch {
                what,
                expected,
                found,
            } => write!(f, "{} has dimension {}, expected {}", what, found, expected),
            LqgError::EmptyHorizon => write!(f, "Horizon is too short"),
            LqgError::EmptyBatch => write!(f, "Batch contains no trials"),
            LqgError::SingularMatrix => write!(f, "Matrix is singular"),
            LqgError::NotPositiveSemidefinite => {
                write!(f, "Covariance is not positive semidefinite")
            }
        }
    }
}

pub type Result<T> = ::core::result::Result<T, LqgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let shape = LqgError::ShapeMismatch {
            matrix: "B",
            expected: (2, 1),
            found: (3, 1),
        };
        assert_eq!(shape.kind(), ErrorKind::Shape);
        assert_eq!(LqgError::EmptyBatch.kind(), ErrorKind::Dimension);
        assert_eq!(LqgError::SingularMatrix.kind(), ErrorKind::Numerical);
    }

    #[test]
    fn test_error_display() {
        let err = LqgError::ShapeMismatch {
            matrix: "B",
            expected: (2, 1),
            found: (3, 1),
        };
        assert_eq!(err.to_string(), "Matrix B has shape 3x1, expected 2x1");

        let err = LqgError::DimensionMismatch {
            what: "initial state",
            expected: 2,
            found: 3,
        };
        assert_eq!(err.to_string(), "initial state has dimension 3, expected 2");
    }
}

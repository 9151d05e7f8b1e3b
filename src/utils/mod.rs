//! Linear algebra helpers shared by the simulator and the filter
//!
//! Block assembly of augmented matrices, shape checks and checked
//! factorisations.

mod blocks;
mod linalg;

pub use blocks::*;
pub use linalg::*;

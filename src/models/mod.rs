//! State-space model: plant, controller and gain computation
//!
//! The plant ([`Dynamics`]) is the true physical system. The controller
//! ([`Actor`]) carries its own, possibly mismatched, internal model together
//! with the quadratic cost used to derive its feedback gains. A [`System`]
//! composes both with a [`GainProvider`].

mod dynamics;
mod gains;
mod system;

pub use dynamics::*;
pub use gains::*;
pub use system::*;

//! Equilibrium solutions and time integration of the
//! two-locus moment system.

mod error;
mod linalg;

pub mod equilibrium;
pub mod integrate;

pub use equilibrium::{steady_state, steady_state_h, steady_state_two_pop, SteadyState};
pub use error::NumericsError;
pub use integrate::{
    integrate, CachePolicy, Epoch, EpochBuilder, IntegrationReport, PopulationSizes,
    DEFAULT_THETA, DEFAULT_TIME_STEP,
};

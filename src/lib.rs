#![warn(missing_docs)]

//! Expected two-locus statistics for populations
//! evolving under drift, mutation, recombination
//! and migration.
//!
//! # Overview
//!
//! Statistics are held by [`LdStats`]: one vector of
//! LD moments per recombination rate plus a vector of
//! heterozygosities. States start at equilibrium, are
//! advanced through [`Epoch`]s of constant or varying
//! population sizes, and are transformed between epochs
//! by splits, merges, admixture and marginalization.
//!
//! The numerical work lives in the member crates:
//!
//! * `ldmoments-core`: statistic names and index lookup
//! * `ldmoments-operators`: the linear operators and population maps
//! * `ldmoments-numerics`: equilibrium solves and integration
//!
//! # Where to find examples
//!
//! In the `demos/` directory of the project repository.

pub mod demographics;
mod error;
pub mod prelude;
mod stats;

pub use error::LdError;
pub use ldmoments_core::{Moment, MomentIndex};
pub use ldmoments_numerics::{
    CachePolicy, Epoch, EpochBuilder, IntegrationReport, PopulationSizes,
};
pub use stats::LdStats;

/// Get the ldmoments version number.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

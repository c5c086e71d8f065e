//! Moment names and index lookup for two-locus statistics.
//!
//! The LD moment system tracks, for `n` populations, the
//! statistics `DD_i_j`, `Dz_i_j_k` and `pi2_i_j_k_l`, plus
//! the heterozygosities `H_i_j`. This crate enumerates them
//! in a fixed order and maps names to vector positions.

use thiserror::Error;

mod index;
mod moment;
mod names;
pub mod prelude;

pub use index::moment_index;
pub use index::MomentIndex;
pub use moment::Moment;
pub use names::het_names;
pub use names::ld_names;
pub use names::num_het_moments;
pub use names::num_ld_moments;

/// Errors from name parsing and index lookup.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// The string is not a moment name.
    #[error("unknown moment name: {0:?}")]
    UnknownMoment(String),
    /// The moment refers to a population that does not exist.
    #[error("{moment} is not a statistic for {num_pops} population(s)")]
    MomentOutOfRange {
        /// The offending moment
        moment: Moment,
        /// Number of populations of the index
        num_pops: usize,
    },
    /// A population index is out of range.
    #[error("population index {index} out of range for {num_pops} population(s)")]
    PopulationIndex {
        /// The offending index
        index: usize,
        /// Number of populations
        num_pops: usize,
    },
    /// Two objects that must have conformant lengths do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Required length
        expected: usize,
        /// Observed length
        found: usize,
    },
}

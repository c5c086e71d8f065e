//! Linear operators and population transformations
//! for the LD moment system.
//!
//! Time is measured in units of `2N` generations of a
//! reference population, relative sizes are `nu_i = N_i / N`,
//! `theta = 4Nu` and `rho = 4Nr`. Migration rates
//! `m[(i, j)]` are scaled rates of migration into
//! population `i` from population `j`.

use thiserror::Error;

mod assembly;
mod manips;
mod matrices;
mod traits;

pub use manips::PopulationMap;
pub use matrices::MomentOperators;
pub use traits::OperatorBuilder;

/// Error type for operator assembly and transformations.
#[derive(Error, Debug, PartialEq)]
pub enum OperatorError {
    /// A redirection of a [``ldmoments_core::Error``].
    #[error("{value}")]
    IndexError {
        /// The redirected error
        #[from]
        value: ldmoments_core::Error,
    },
    /// A parameter is outside of its domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub(crate) fn check_len(expected: usize, found: usize) -> Result<(), OperatorError> {
    if expected == found {
        Ok(())
    } else {
        Err(ldmoments_core::Error::DimensionMismatch { expected, found }.into())
    }
}

pub(crate) fn check_population(index: usize, num_pops: usize) -> Result<(), OperatorError> {
    if index < num_pops {
        Ok(())
    } else {
        Err(ldmoments_core::Error::PopulationIndex { index, num_pops }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_redirection() {
        let e: OperatorError = ldmoments_core::Error::PopulationIndex {
            index: 3,
            num_pops: 2,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "population index 3 out of range for 2 population(s)"
        );
        assert!(check_len(3, 3).is_ok());
        assert!(matches!(
            check_len(3, 15),
            Err(OperatorError::IndexError {
                value: ldmoments_core::Error::DimensionMismatch { .. }
            })
        ));
    }
}

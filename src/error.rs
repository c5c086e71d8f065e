//! Error handling
use ldmoments_numerics::NumericsError;
use ldmoments_operators::OperatorError;
use thiserror::Error;

/// Primary error type.
///
/// Some members of this enum implement ``From``
/// in order to redirect other error types.
#[derive(Error, Debug, PartialEq)]
pub enum LdError {
    /// A redirection of a [``NumericsError``].
    #[error("{value}")]
    NumericsError {
        /// The redirected error
        #[from]
        value: NumericsError,
    },
    /// A redirection of an [``OperatorError``].
    #[error("{value}")]
    OperatorError {
        /// The redirected error
        #[from]
        value: OperatorError,
    },
    /// A redirection of a [``ldmoments_core::Error``].
    #[error("{value}")]
    IndexError {
        /// The redirected error
        #[from]
        value: ldmoments_core::Error,
    },
    /// Population ids are missing or inconsistent.
    #[error("invalid population ids: {0}")]
    PopulationIds(String),
}

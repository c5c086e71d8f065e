use ldmoments_operators::OperatorError;
use thiserror::Error;

/// Error type for equilibrium solves and integration.
#[derive(Error, Debug, PartialEq)]
pub enum NumericsError {
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
    /// A parameter is outside of its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A linear system could not be solved.
    #[error("singular matrix in {0}")]
    SingularMatrix(String),
    /// Integration produced NaN or infinite values.
    #[error("non-finite state after {steps} step(s)")]
    NonFiniteState { steps: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirection() {
        let e: NumericsError = OperatorError::InvalidArgument("x".to_string()).into();
        assert_eq!(e.to_string(), "invalid argument: x");
        let e: NumericsError = ldmoments_core::Error::DimensionMismatch {
            expected: 3,
            found: 1,
        }
        .into();
        assert!(matches!(e, NumericsError::IndexError { .. }));
    }
}

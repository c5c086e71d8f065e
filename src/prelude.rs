//! The crate prelude
//!
//! # Example
//! ```
//! use ldmoments::prelude::*;
//! ```

pub use crate::demographics::ModelOptions;
pub use crate::LdError;
pub use crate::LdStats;
pub use ldmoments_core::prelude::*;
pub use ldmoments_numerics::{CachePolicy, EpochBuilder};

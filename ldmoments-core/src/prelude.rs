//! The crate prelude
//!
//! # Example
//! ```
//! use ldmoments_core::prelude::*;
//! ```

pub use crate::moment_index;
pub use crate::Moment;
pub use crate::MomentIndex;

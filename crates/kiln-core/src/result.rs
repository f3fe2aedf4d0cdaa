//! Result type aliases for Kiln.

use crate::KilnError;

/// A specialized `Result` type for Kiln operations.
pub type KilnResult<T> = Result<T, KilnError>;

//! Result type alias for mirrorsync operations

use crate::Error;

/// Result type alias for mirrorsync operations
pub type Result<T> = std::result::Result<T, Error>;

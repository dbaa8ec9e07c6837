//! Post-decode validation hook.

use crate::error::ConfigResult;

/// A configuration type that can check its own invariants after decoding.
///
/// Return [`ConfigError::Validation`](crate::ConfigError::Validation) with a
/// description of the first problem found.
pub trait Validate {
    /// Check the decoded value.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the value is not acceptable.
    fn validate(&self) -> ConfigResult<()>;
}

/// Boxed validation closure, as stored by the loader.
pub(crate) type Validator<T> = Box<dyn Fn(&T) -> ConfigResult<()>>;

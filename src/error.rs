//! Error types for temp data operations.

use thiserror::Error;

/// Errors raised by [`TempData`](crate::TempData) operations that can fail for
/// reasons other than the backend alone.
///
/// `E` is the backend's error type, carried through unchanged.
#[derive(Debug, Error)]
pub enum TempDataError<E> {
    /// A strict insert hit a key that is already present.
    ///
    /// Use `set` to overwrite an existing entry.
    #[error("an entry with key `{key}` already exists")]
    DuplicateKey { key: String },

    /// A stored value could not be converted to or from the requested type.
    #[error("value for key `{key}` could not be converted")]
    Conversion {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Loading from or saving to the backend failed.
    #[error("temp data backend failed")]
    Backend(#[source] E),
}

impl<E> TempDataError<E> {
    /// Whether this is a duplicate-key failure
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, TempDataError::DuplicateKey { .. })
    }
}

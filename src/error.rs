//! Error values returned by the engine.
//!
//! Nothing in this crate panics on caller input: bad requests, out-of-range
//! catalog lookups, oversized builds and persistence failures all come back
//! as an [`Error`].

use std::fmt;
use std::io;

/// Error type for engine operations.
#[derive(Debug)]
pub enum Error {
    /// Malformed request: bad cycle length, layer number or symbol text.
    InvalidInput(String),
    /// A `(size, index)` pair that does not name a catalog entry.
    IndexOutOfRange { size: usize, index: usize, len: usize },
    /// Catalog construction would exceed the configured budget.
    ResourceExhausted { edo: u32, reason: String },
    /// The backing store could not be read or written.
    Persistence(StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::IndexOutOfRange { size, index, len } => {
                write!(f, "Index {} out of range for size {} (catalog has {} entries)", index, size, len)
            }
            Error::ResourceExhausted { edo, reason } => {
                write!(f, "Resource budget exhausted building catalog for edo {}: {}", edo, reason)
            }
            Error::Persistence(e) => write!(f, "Persistence error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Persistence(e)
    }
}

/// Error type for the persistence layer.
#[derive(Debug)]
pub enum StoreError {
    /// File I/O error.
    Io(io::Error),
    /// The stored document is not valid JSON for the expected schema.
    Json(serde_json::Error),
    /// The stored document parsed, but violates a catalog invariant.
    Corrupt(String),
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
            StoreError::Json(e) => write!(f, "JSON error: {}", e),
            StoreError::Corrupt(msg) => write!(f, "Corrupt record: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Json(e) => Some(e),
            StoreError::Corrupt(_) => None,
        }
    }
}

/// A value computed in memory, together with the outcome of persisting it.
///
/// Persistence failures never discard the computed value; callers that want
/// them as hard errors use [`Synced::into_result`].
#[derive(Debug)]
#[must_use]
pub struct Synced<T> {
    pub value: T,
    pub store_error: Option<StoreError>,
}

impl<T> Synced<T> {
    pub fn ok(value: T) -> Self {
        Self { value, store_error: None }
    }

    pub fn with_error(value: T, store_error: Option<StoreError>) -> Self {
        Self { value, store_error }
    }

    /// True if the value reached the store (or there is no store).
    pub fn is_persisted(&self) -> bool {
        self.store_error.is_none()
    }

    /// Drops the persistence outcome.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Turns a persistence failure into [`Error::Persistence`].
    pub fn into_result(self) -> Result<T> {
        match self.store_error {
            None => Ok(self.value),
            Some(e) => Err(Error::Persistence(e)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        Synced {
            value: f(self.value),
            store_error: self.store_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::IndexOutOfRange { size: 3, index: 7, len: 4 };
        assert_eq!(e.to_string(), "Index 7 out of range for size 3 (catalog has 4 entries)");

        let e = Error::from(StoreError::Corrupt("bad".into()));
        assert_eq!(e.to_string(), "Persistence error: Corrupt record: bad");
    }

    #[test]
    fn test_synced_into_result() {
        assert_eq!(Synced::ok(5).into_result().unwrap(), 5);

        let failed = Synced::with_error(5, Some(StoreError::Corrupt("x".into())));
        assert!(!failed.is_persisted());
        assert!(matches!(failed.into_result(), Err(Error::Persistence(_))));
    }
}

//! Error types for live filters.

use thiserror::Error;

/// Result type for view operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors that can occur when using a live filter.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewError {
    /// The filter was disposed; its output must no longer be used.
    #[error("live filter has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ViewError::Disposed.to_string(), "live filter has been disposed");
    }
}

//! Error types for the resource pool

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by the resource lifecycle hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource factory failed: {0}")]
    Factory(#[source] BoxError),

    #[error("Failed to close resource: {0}")]
    Close(#[source] BoxError),

    #[error("Resource does not belong to this pool")]
    InvalidResource,

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PoolError {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        PoolError::InvalidConfig(msg.into())
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_factory_error_keeps_source() {
        let err = PoolError::Factory(Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")));
        assert_eq!(err.to_string(), "Resource factory failed: refused");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_timeout_message() {
        let err = PoolError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Operation timed out after 250ms");
    }
}

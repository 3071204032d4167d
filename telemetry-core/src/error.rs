//! Error taxonomy shared by every layer of the gateway core.

use std::time::Duration;

use thiserror::Error;

/// Failure reported to the caller of any core operation.
///
/// `InvalidQuery` and `InvalidSample` are client errors; everything else is
/// a server-side failure. Nothing in this crate retries on any variant.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("credentials unavailable: {0}")]
    CredentialUnavailable(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("deadline of {0:?} expired before the backend answered")]
    Timeout(Duration),
}

impl Error {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    pub fn invalid_sample(msg: impl Into<String>) -> Self {
        Error::InvalidSample(msg.into())
    }

    /// True for errors caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_) | Error::InvalidSample(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::invalid_query("bad").is_client_error());
        assert!(Error::invalid_sample("bad").is_client_error());
        assert!(!Error::CredentialUnavailable("x".into()).is_client_error());
        assert!(!Error::BackendUnavailable("x".into()).is_client_error());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_client_error());
    }

    #[test]
    fn display_carries_detail() {
        let e = Error::BackendUnavailable("401 unauthorized".into());
        assert_eq!(e.to_string(), "backend unavailable: 401 unauthorized");
    }
}

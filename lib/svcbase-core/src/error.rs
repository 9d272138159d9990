use svcbase_discovery::DiscoveryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BaseError>;

#[derive(Error, Debug)]
pub enum BaseError {
    /// Malformed or missing required configuration; fatal to start.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Discovery backend failure, propagated unmodified and never retried
    /// by this layer.
    #[error("discovery backend error: {0}")]
    BackendUnavailable(#[from] DiscoveryError),

    /// Publish attempted after an unrecoverable lazy-start failure.
    #[error("cannot create discovery service: {0}")]
    IllegalState(String),

    /// One or more deregistrations failed during stop; carries the first
    /// cause. Resource cleanup still completed.
    #[error("shutdown finished with {failed} failed deregistration(s): {source}")]
    Shutdown {
        failed: usize,
        #[source]
        source: DiscoveryError,
    },
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("invalid discovery settings: {0}")]
    InvalidSettings(String),

    #[error("discovery backend unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("discovery backend rejected {operation} of '{name}' (status {status})")]
    Rejected {
        operation: &'static str,
        name: String,
        status: u16,
    },

    #[error("record not found in registry: {0}")]
    NotFound(String),

    #[error("discovery session is closed")]
    SessionClosed,
}

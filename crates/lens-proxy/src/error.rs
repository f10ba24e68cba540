//! Error types for the proxy.

use thiserror::Error;

use lens_core::ForwardError;

/// Proxy error type.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// CA certificate error.
    #[error("CA error: {0}")]
    Ca(#[from] CaManagerError),

    /// The capture pipeline could not be set up.
    #[error("capture pipeline error: {0}")]
    Pipeline(#[from] ForwardError),

    /// The proxy failed to build or stopped with an error.
    #[error("proxy error: {0}")]
    Proxy(String),
}

/// CA manager error type.
#[derive(Debug, Error)]
pub enum CaManagerError {
    /// No platform data directory could be determined.
    #[error("no data directory available for the CA")]
    NoDataDir,

    /// Key or certificate generation failed.
    #[error("failed to generate CA: {0}")]
    Generation(String),

    /// Reading or writing the CA files failed.
    #[error("CA file error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored key or certificate is malformed.
    #[error("failed to parse CA: {0}")]
    Parse(String),
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

//! Error types for certificate probing, endpoint loading and startup.
//!
//! Probe and load errors are recoverable: a probe error is isolated to its
//! domain for one collection cycle, a load error leaves the current endpoint
//! list in place. Only [`StartupError`] is meant to end the process.

use std::io;

use openssl::ssl::HandshakeError;
use thiserror::Error;

use crate::probe::ProbeErrorKind;

/// Error returned when a live TLS handshake against a domain fails.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// DNS resolution failed for the given hostname
    #[error("failed to resolve hostname: {hostname}")]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to the target address
    #[error("connection failed to: {address}")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// Network operation timeout
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of which operation timed out
        operation: String,
    },

    /// The handshake completed but the peer chain was empty
    #[error("peer presented no certificate")]
    NoCertificatePresented,

    /// OpenSSL error occurred
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] openssl::error::ErrorStack),
}

impl ProbeError {
    /// Collapses the detailed error into the kind exported by the collector.
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            Self::NoCertificatePresented => ProbeErrorKind::NoCertificatePresented,
            _ => ProbeErrorKind::ConnectionFailed,
        }
    }
}

impl<S> From<HandshakeError<S>> for ProbeError {
    fn from(e: HandshakeError<S>) -> Self {
        match e {
            HandshakeError::SetupFailure(stack) => Self::OpenSSL(stack),
            // Blocking sockets only report WouldBlock once a timeout fires.
            HandshakeError::WouldBlock(_) => Self::Timeout {
                operation: "TLS handshake".to_string(),
            },
            HandshakeError::Failure(mid) => {
                let timed_out = mid.error().io_error().is_some_and(|io| {
                    matches!(
                        io.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    )
                });
                if timed_out {
                    Self::Timeout {
                        operation: "TLS handshake".to_string(),
                    }
                } else {
                    Self::HandshakeFailed {
                        details: mid.error().to_string(),
                    }
                }
            }
        }
    }
}

/// Errors that can occur while fetching and installing an endpoint list.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete (DNS, connect, timeout, body read)
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-success status
    #[error("failure loading {url}: status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The payload is not a `{"domains": [...]}` document
    #[error("malformed configuration payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload parsed but listed no domains
    #[error("configuration contains no domains")]
    Empty,
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}

/// Conditions under which the exporter must not start serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("initial endpoint load failed: {0}")]
    InitialLoad(#[from] LoadError),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

//! Live TLS handshakes that report how long a domain's leaf certificate
//! remains valid.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::ssl::{Ssl, SslContext, SslMethod, SslVerifyMode};
use strum_macros::{AsRefStr, Display};

use crate::error::ProbeError;
use crate::store::Endpoint;

/// The only port probed.
pub const TLS_PORT: u16 = 443;

/// Connect, read and write timeout applied to each handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SECONDS_PER_DAY: i64 = 86_400;

/// Why a probe produced no expiry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProbeErrorKind {
    /// TCP connect or TLS handshake did not complete
    ConnectionFailed,
    /// The handshake completed without a peer certificate
    NoCertificatePresented,
}

/// Outcome of probing one domain during one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Success {
        domain: Endpoint,
        /// Negative once the certificate has expired.
        seconds_until_expiry: i64,
    },
    Failure {
        domain: Endpoint,
        reason: ProbeErrorKind,
        /// Human readable cause, for logs only.
        detail: String,
    },
}

impl ProbeResult {
    pub fn from_outcome(domain: Endpoint, outcome: Result<i64, ProbeError>) -> Self {
        match outcome {
            Ok(seconds_until_expiry) => ProbeResult::Success {
                domain,
                seconds_until_expiry,
            },
            Err(err) => ProbeResult::Failure {
                domain,
                reason: err.kind(),
                detail: err.to_string(),
            },
        }
    }

    pub fn domain(&self) -> &Endpoint {
        match self {
            ProbeResult::Success { domain, .. } | ProbeResult::Failure { domain, .. } => domain,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success { .. })
    }

    pub fn seconds_until_expiry(&self) -> Option<i64> {
        match self {
            ProbeResult::Success {
                seconds_until_expiry,
                ..
            } => Some(*seconds_until_expiry),
            ProbeResult::Failure { .. } => None,
        }
    }
}

/// Determines the remaining certificate lifetime of one domain.
///
/// Implementations never panic on network trouble; every failure comes back
/// as [`ProbeResult::Failure`].
pub trait Prober: Send + Sync {
    fn probe(&self, endpoint: &Endpoint) -> ProbeResult;
}

impl<P: Prober + ?Sized> Prober for Arc<P> {
    fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        self.as_ref().probe(endpoint)
    }
}

/// Prober backed by a blocking OpenSSL handshake.
///
/// Every call opens a fresh connection; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct OpensslProbe {
    timeout: Duration,
    port: u16,
    verify_peer: bool,
}

impl Default for OpensslProbe {
    fn default() -> Self {
        OpensslProbe::new(DEFAULT_TIMEOUT)
    }
}

impl OpensslProbe {
    pub fn new(timeout: Duration) -> Self {
        OpensslProbe {
            timeout,
            port: TLS_PORT,
            verify_peer: false,
        }
    }

    /// Validate the peer chain against the system trust store. A chain
    /// that fails validation is reported as a connection failure.
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    #[cfg(test)]
    fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Performs the handshake and returns `not_after - now` in seconds for
    /// the leaf certificate.
    pub fn seconds_until_expiry(&self, host: &str) -> Result<i64, ProbeError> {
        let context = self.context()?;
        let mut ssl = Ssl::new(&context)?;
        ssl.set_hostname(host)?;
        if self.verify_peer {
            ssl.param_mut().set_host(host)?;
        }

        let address = format!("{}:{}", host, self.port);
        let socket_addrs = address
            .to_socket_addrs()
            .map_err(|source| ProbeError::DnsResolution {
                hostname: host.to_string(),
                source,
            })?;
        let tcp_stream = connect_any(socket_addrs, self.timeout, host, self.port)?;
        let configure = |source| ProbeError::ConnectionFailed {
            address: address.clone(),
            source,
        };
        tcp_stream
            .set_read_timeout(Some(self.timeout))
            .map_err(configure)?;
        tcp_stream
            .set_write_timeout(Some(self.timeout))
            .map_err(configure)?;

        // The stream owns the socket; every return below closes it on drop.
        let stream = ssl.connect(tcp_stream)?;
        // Unreachable in practice: the default cipher list never offers
        // anonymous suites, so a server without a certificate aborts the
        // handshake instead.
        let leaf = stream
            .ssl()
            .peer_certificate()
            .ok_or(ProbeError::NoCertificatePresented)?;

        let now = Asn1Time::days_from_now(0)?;
        Ok(seconds_between(&now, leaf.not_after())?)
    }

    fn context(&self) -> Result<SslContext, ErrorStack> {
        let mut context = SslContext::builder(SslMethod::tls())?;
        if self.verify_peer {
            context.set_default_verify_paths()?;
            context.set_verify(SslVerifyMode::PEER);
        } else {
            context.set_verify(SslVerifyMode::NONE);
        }
        Ok(context.build())
    }
}

impl Prober for OpensslProbe {
    fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        ProbeResult::from_outcome(endpoint.clone(), self.seconds_until_expiry(endpoint.as_str()))
    }
}

/// Tries each resolved address in turn and returns the first stream that
/// connects within `timeout`. When all of them fail, the error of the last
/// attempt is returned.
fn connect_any<I>(
    addrs: I,
    timeout: Duration,
    host: &str,
    port: u16,
) -> Result<TcpStream, ProbeError>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let address = format!("{}:{}", host, port);
    let mut last_err = None;
    for socket_addr in addrs {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(source) if source.kind() == io::ErrorKind::TimedOut => {
                last_err = Some(ProbeError::Timeout {
                    operation: format!("connect to {}", address),
                });
            }
            Err(source) => {
                last_err = Some(ProbeError::ConnectionFailed {
                    address: address.clone(),
                    source,
                });
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ProbeError::DnsResolution {
        hostname: host.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
    }))
}

/// Signed number of seconds from `now` until `not_after`.
pub fn seconds_between(now: &Asn1TimeRef, not_after: &Asn1TimeRef) -> Result<i64, ErrorStack> {
    let diff = now.diff(not_after)?;
    Ok(i64::from(diff.days) * SECONDS_PER_DAY + i64::from(diff.secs))
}

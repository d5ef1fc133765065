//! Address resolution for SOCKS5 targets
//!
//! Wraps the platform resolver behind a small adapter that orders
//! endpoints by an address-family hint and classifies failures into the
//! SOCKS5 reply taxonomy.

use crate::error::ReplyCode;
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing::debug;

/// Preferred address family for a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyHint {
    /// Prefer IPv4 endpoints
    V4,
    /// Prefer IPv6 endpoints
    V6,
    /// No preference
    Any,
}

impl FamilyHint {
    /// Whether the given endpoint belongs to the hinted family
    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            FamilyHint::V4 => addr.is_ipv4(),
            FamilyHint::V6 => addr.is_ipv6(),
            FamilyHint::Any => true,
        }
    }
}

impl From<IpAddr> for FamilyHint {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => FamilyHint::V4,
            IpAddr::V6(_) => FamilyHint::V6,
        }
    }
}

/// Resolution failures, each carrying its SOCKS5 reply code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The resolver reported no such name
    #[error("host not found")]
    HostUnreachable,

    /// The resolver returned successfully but with no endpoints
    #[error("no addresses returned")]
    NetworkUnreachable,

    /// The resolver timed out
    #[error("resolver timed out")]
    TimedOut,

    /// Any other resolver failure
    #[error("resolver failure")]
    GeneralFailure,
}

impl ResolveError {
    /// The SOCKS5 reply code reported to the client for this failure
    pub fn reply_code(self) -> ReplyCode {
        match self {
            ResolveError::HostUnreachable => ReplyCode::HostUnreachable,
            ResolveError::NetworkUnreachable => ReplyCode::NetworkUnreachable,
            ResolveError::TimedOut => ReplyCode::TtlExpired,
            ResolveError::GeneralFailure => ReplyCode::GeneralFailure,
        }
    }
}

/// Resolve a host name to an ordered list of endpoints.
///
/// Endpoints matching the family hint are moved to the front; resolver
/// order is preserved otherwise. Callers attempt the result first to last,
/// so a hinted family is tried before falling back to the other one.
pub async fn resolve(
    host: &str,
    port: u16,
    hint: FamilyHint,
) -> Result<Vec<SocketAddr>, ResolveError> {
    let resolved = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        debug!("Resolution of {} failed: {}", host, e);
        classify_lookup_error(&e)
    })?;

    let (mut endpoints, other): (Vec<_>, Vec<_>) = resolved.partition(|addr| hint.matches(addr));
    endpoints.extend(other);

    if endpoints.is_empty() {
        return Err(ResolveError::NetworkUnreachable);
    }

    Ok(endpoints)
}

fn classify_lookup_error(err: &io::Error) -> ResolveError {
    match err.kind() {
        io::ErrorKind::TimedOut => ResolveError::TimedOut,
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::OutOfMemory => {
            ResolveError::GeneralFailure
        }
        // getaddrinfo failures surface without a dedicated error kind
        _ => ResolveError::HostUnreachable,
    }
}

//! SOCKS5 authentication module
//!
//! Handles method negotiation and username/password authentication.

pub mod password;

use super::consts::*;
use crate::config::ServerConfig;
use crate::error::Socks5Error;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// Username/password authentication
    Password,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }
}

/// Perform SOCKS5 method negotiation.
///
/// Reads the client's `VER NMETHODS METHODS` greeting, selects a method
/// and writes the `VER METHOD` choice. When no offered method is
/// acceptable the choice byte is 0xFF and the negotiation fails.
///
/// # Request
///
/// ```text
///                    {SOCKS version, methods-length, methods...}
///     eg. (no auth)  {5, 1, 0}
///     eg. (password) {5, 2, 0, 2}
/// ```
pub async fn negotiate<S>(stream: &mut S, config: &ServerConfig) -> Result<AuthMethod>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;

    let version = head[0];
    let num_methods = head[1];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }

    if num_methods == 0 {
        return Err(Socks5Error::Malformed("no authentication methods offered").into());
    }

    let mut methods = vec![0u8; num_methods as usize];
    stream.read_exact(&mut methods).await?;
    debug!("Methods offered by the client: {:?}", methods);

    let selected = select_method(&methods, config);

    stream
        .write_all(&[
            SOCKS5_VERSION,
            selected
                .map(AuthMethod::to_byte)
                .unwrap_or(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE),
        ])
        .await?;
    stream.flush().await?;

    match selected {
        Some(method) => Ok(method),
        None => Err(Socks5Error::NoAcceptableMethod.into()),
    }
}

/// Walk the client's method list in order and pick the first one the
/// server can honor. No-auth is honored only without configured
/// credentials, username/password only with them; the two never coexist.
fn select_method(methods: &[u8], config: &ServerConfig) -> Option<AuthMethod> {
    methods.iter().find_map(|&method| match method {
        SOCKS5_AUTH_METHOD_NONE if !config.has_credentials() => Some(AuthMethod::None),
        SOCKS5_AUTH_METHOD_PASSWORD if config.has_credentials() => Some(AuthMethod::Password),
        _ => None,
    })
}

//! SOCKS5 request parser
//!
//! Parses the SOCKS5 request that follows method negotiation.

use crate::error::{ReplyCode, Socks5Error};
use crate::socks::command::send_reply;
use crate::socks::consts::*;
use crate::socks::types::{SocksCommand, TargetAddr};
use anyhow::{Context, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, warn};

/// Parse a SOCKS5 request from the stream.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// A short read or unsupported version closes the connection without a
/// reply. An unknown address type is answered with reply code 0x08, an
/// unknown command with 0x07; in both cases the error is returned so the
/// session ends. The address is consumed before the command is validated,
/// so an unknown command still drains the full request.
pub async fn parse_request<S>(stream: &mut S) -> Result<(SocksCommand, TargetAddr)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Read: VER CMD RSV ATYP
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .with_context(|| "Failed to read request header")?;

    let version = header[0];
    let cmd_byte = header[1];
    let _reserved = header[2];
    let addr_type = header[3];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }

    let target_addr = match parse_address(stream, addr_type).await {
        Ok(addr) => addr,
        Err(ParseAddrError::Unsupported(atyp)) => {
            warn!("Unsupported address type: {}", atyp);
            send_reply(stream, ReplyCode::AddressTypeNotSupported, None).await?;
            return Err(Socks5Error::AddressTypeNotSupported(atyp).into());
        }
        Err(ParseAddrError::Fatal(err)) => return Err(err),
    };

    let command = match SocksCommand::from_byte(cmd_byte) {
        Some(command) => command,
        None => {
            warn!("Unsupported command: {}", cmd_byte);
            send_reply(stream, ReplyCode::CommandNotSupported, None).await?;
            return Err(Socks5Error::CommandNotSupported(cmd_byte).into());
        }
    };

    debug!("Parsed SOCKS5 request: {} to {}", command, target_addr);

    Ok((command, target_addr))
}

enum ParseAddrError {
    /// ATYP outside {1, 3, 4}; reported to the client as reply 0x08
    Unsupported(u8),
    /// Short read or malformed address; the connection just closes
    Fatal(anyhow::Error),
}

impl From<std::io::Error> for ParseAddrError {
    fn from(err: std::io::Error) -> Self {
        ParseAddrError::Fatal(err.into())
    }
}

/// Parse the address and port portion of a SOCKS5 request
async fn parse_address<S>(stream: &mut S, addr_type: u8) -> Result<TargetAddr, ParseAddrError>
where
    S: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            let port = read_port(stream).await?;

            Ok(TargetAddr::ipv4(Ipv4Addr::from(addr), port))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len_buf = [0u8; 1];
            stream.read_exact(&mut len_buf).await?;
            let domain_len = len_buf[0] as usize;

            if domain_len == 0 {
                return Err(ParseAddrError::Fatal(
                    Socks5Error::InvalidDomain("empty domain name".to_string()).into(),
                ));
            }

            let mut domain_buf = vec![0u8; domain_len];
            stream.read_exact(&mut domain_buf).await?;
            let domain = String::from_utf8(domain_buf).map_err(|_| {
                ParseAddrError::Fatal(
                    Socks5Error::InvalidDomain("non-ASCII domain name".to_string()).into(),
                )
            })?;

            let port = read_port(stream).await?;

            Ok(TargetAddr::domain(domain, port))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut addr = [0u8; 16];
            stream.read_exact(&mut addr).await?;
            let port = read_port(stream).await?;

            Ok(TargetAddr::ipv6(Ipv6Addr::from(addr), port))
        }

        other => Err(ParseAddrError::Unsupported(other)),
    }
}

async fn read_port<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<u16> {
    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}

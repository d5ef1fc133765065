//! SOCKS5 reply builder
//!
//! Constructs SOCKS5 reply messages. Replies always carry a resolved IP;
//! the domain address type is never emitted by the server.

use crate::error::ReplyCode;
use crate::socks::consts::*;
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode a SOCKS5 reply.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// The IPv4 form is 10 bytes, the IPv6 form 22 bytes. When no bound
/// address applies (error replies) the address defaults to 0.0.0.0:0.
pub fn encode_reply(code: ReplyCode, bind_addr: Option<SocketAddr>) -> Vec<u8> {
    let bind_addr =
        bind_addr.unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0));

    let mut reply = Vec::with_capacity(22);
    reply.push(SOCKS5_VERSION);
    reply.push(code.into());
    reply.push(SOCKS5_RESERVED);

    match bind_addr {
        SocketAddr::V4(addr) => {
            reply.push(SOCKS5_ADDR_TYPE_IPV4);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
        SocketAddr::V6(addr) => {
            reply.push(SOCKS5_ADDR_TYPE_IPV6);
            reply.extend_from_slice(&addr.ip().octets());
            reply.extend_from_slice(&addr.port().to_be_bytes());
        }
    }

    reply
}

/// Encode and send a SOCKS5 reply, writing it in full.
pub async fn send_reply<S>(
    stream: &mut S,
    code: ReplyCode,
    bind_addr: Option<SocketAddr>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let reply = encode_reply(code, bind_addr);

    stream
        .write_all(&reply)
        .await
        .with_context(|| "Failed to write reply")?;
    stream.flush().await?;

    Ok(())
}

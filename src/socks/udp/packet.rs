//! UDP packet encoding/decoding for SOCKS5
//!
//! Handles the encapsulation format for UDP packets in SOCKS5. These are
//! pure functions over byte buffers; all I/O lives in the relay.

use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use anyhow::{bail, Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// UDP packet structure for SOCKS5
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone)]
pub struct UdpPacket {
    /// Fragment number (0 for standalone packets)
    pub frag: u8,
    /// Target/source address
    pub addr: TargetAddr,
    /// Packet payload
    pub data: Bytes,
}

impl UdpPacket {
    /// Create a new unfragmented UDP packet
    pub fn new(addr: TargetAddr, data: Bytes) -> Self {
        UdpPacket {
            frag: 0,
            addr,
            data,
        }
    }

    /// Check if this is a fragmented packet
    pub fn is_fragmented(&self) -> bool {
        self.frag != 0
    }
}

/// Parse a UDP packet from bytes.
///
/// Frames shorter than the minimum header for their address type are
/// errors; callers drop such datagrams silently.
pub fn parse_udp_packet(data: &[u8]) -> Result<UdpPacket> {
    if data.len() < 4 {
        bail!("UDP packet too short: {} bytes", data.len());
    }

    let mut buf = data;

    // RSV (2 bytes) - must be 0
    let rsv = buf.get_u16();
    if rsv != 0 {
        bail!("Invalid RSV field: {}", rsv);
    }

    // FRAG (1 byte)
    let frag = buf.get_u8();

    // ATYP (1 byte)
    let atyp = buf.get_u8();

    let (addr, remaining) = parse_address_from_buf(atyp, buf)?;

    // Remaining data is the payload
    let data = Bytes::copy_from_slice(remaining);

    Ok(UdpPacket { frag, addr, data })
}

/// Parse address from buffer
fn parse_address_from_buf(atyp: u8, mut buf: &[u8]) -> Result<(TargetAddr, &[u8])> {
    match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            if buf.len() < 6 {
                bail!("Buffer too short for IPv4 address");
            }
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            buf = &buf[4..];
            let port = buf.get_u16();
            Ok((TargetAddr::ipv4(ip, port), buf))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            if buf.is_empty() {
                bail!("Buffer too short for domain length");
            }
            let len = buf[0] as usize;
            buf = &buf[1..];

            if len == 0 {
                bail!("Invalid domain length: {}", len);
            }
            if buf.len() < len + 2 {
                bail!("Buffer too short for domain name");
            }
            let domain = String::from_utf8(buf[..len].to_vec())
                .with_context(|| "Invalid UTF-8 in domain")?;
            buf = &buf[len..];
            let port = buf.get_u16();
            Ok((TargetAddr::domain(domain, port), buf))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            if buf.len() < 18 {
                bail!("Buffer too short for IPv6 address");
            }
            let mut ip_bytes = [0u8; 16];
            ip_bytes.copy_from_slice(&buf[..16]);
            let ip = Ipv6Addr::from(ip_bytes);
            buf = &buf[16..];
            let port = buf.get_u16();
            Ok((TargetAddr::ipv6(ip, port), buf))
        }

        _ => bail!("Unknown address type: {}", atyp),
    }
}

/// Encode a UDP packet to bytes.
///
/// The header is emitted with RSV=0 and the packet's FRAG value; the
/// ATYP always matches the address variant, so IPv6 senders are framed
/// with ATYP 0x04.
pub fn encode_udp_packet(packet: &UdpPacket) -> Vec<u8> {
    let mut buf = BytesMut::new();

    // RSV (2 bytes)
    buf.put_u16(0);

    // FRAG (1 byte)
    buf.put_u8(packet.frag);

    // ATYP + address + port
    buf.extend_from_slice(&packet.addr.to_bytes());

    // Payload
    buf.extend_from_slice(&packet.data);

    buf.to_vec()
}

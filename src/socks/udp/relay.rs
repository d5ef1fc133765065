//! UDP relay backing the UDP ASSOCIATE command
//!
//! Runs a datagram relay for the lifetime of the client's control TCP
//! connection. The client sends SOCKS5-framed datagrams to a listener
//! socket; payloads go out through a separate forwarder socket, and
//! return traffic is framed and sent back to the client's last observed
//! UDP endpoint.

use crate::error::ReplyCode;
use crate::resolver::{self, FamilyHint};
use crate::socks::command::send_reply;
use crate::socks::consts::MAX_UDP_PACKET;
use crate::socks::types::TargetAddr;
use crate::socks::udp::{encode_udp_packet, parse_udp_packet, UdpPacket};
use anyhow::{Context, Result};
use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Handle the UDP ASSOCIATE command.
///
/// Binds the listener on the control channel's address family and
/// announces it with BND.ADDR set to the control channel's local IP (the
/// UDP socket itself is bound to the wildcard). The association lives
/// until the control TCP stream closes.
pub async fn handle_udp_associate<S>(
    mut client: S,
    target: TargetAddr,
    control_local: SocketAddr,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    // A domain in DST.ADDR declares where the client will send from;
    // the value itself is unused, but an unresolvable name is an error.
    if let TargetAddr::Domain(host, port) = &target {
        if let Err(e) = resolver::resolve(host, *port, FamilyHint::from(control_local.ip())).await
        {
            warn!("UDP ASSOCIATE declared endpoint {} is unresolvable", target);
            send_reply(&mut client, e.reply_code(), None).await?;
            return Err(e).with_context(|| format!("Failed to resolve {}", target));
        }
    }

    let wildcard: SocketAddr = match control_local {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let listener = match UdpSocket::bind(wildcard).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("UDP listener bind failed: {}", e);
            send_reply(&mut client, ReplyCode::from(&e), None).await?;
            return Err(e.into());
        }
    };

    let forwarder = match UdpSocket::bind(wildcard).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("UDP forwarder bind failed: {}", e);
            send_reply(&mut client, ReplyCode::from(&e), None).await?;
            return Err(e.into());
        }
    };

    // BND.ADDR is the TCP-side local IP; only the port comes from the
    // wildcard-bound UDP socket.
    let reply_addr = SocketAddr::new(control_local.ip(), listener.local_addr()?.port());
    send_reply(&mut client, ReplyCode::Succeeded, Some(reply_addr)).await?;

    info!("UDP association established on {}", reply_addr);

    run_relay(client, listener, forwarder).await;

    info!("UDP association on {} ended", reply_addr);
    Ok(())
}

/// Pump datagrams in both directions until the control stream closes.
///
/// The client's UDP endpoint is learned from the source of every datagram
/// arriving on the listener; return traffic before the first observation
/// is dropped, and later rebindings simply update the endpoint.
async fn run_relay<S>(mut control: S, listener: UdpSocket, forwarder: UdpSocket)
where
    S: AsyncRead + Unpin,
{
    let mut client_endpoint: Option<SocketAddr> = None;
    let mut control_buf = [0u8; 512];
    let mut outbound_buf = vec![0u8; MAX_UDP_PACKET];
    let mut inbound_buf = vec![0u8; MAX_UDP_PACKET];

    loop {
        tokio::select! {
            received = listener.recv_from(&mut outbound_buf) => match received {
                Ok((len, from)) => {
                    client_endpoint = Some(from);
                    forward_outbound(&forwarder, &outbound_buf[..len]).await;
                }
                Err(e) => {
                    debug!("UDP listener closed: {}", e);
                    break;
                }
            },
            received = forwarder.recv_from(&mut inbound_buf) => match received {
                Ok((len, from)) => {
                    forward_inbound(&listener, client_endpoint, from, &inbound_buf[..len]).await;
                }
                Err(e) => {
                    debug!("UDP forwarder closed: {}", e);
                    break;
                }
            },
            read = control.read(&mut control_buf) => match read {
                Ok(0) => {
                    debug!("Control stream closed, ending UDP association");
                    break;
                }
                Ok(_) => {
                    // Data on the control stream has no meaning here
                }
                Err(e) => {
                    debug!("Control stream error: {}", e);
                    break;
                }
            },
        }
    }
}

/// Decode one client datagram and send its payload to the destination.
/// Malformed, fragmented, empty and unresolvable datagrams are dropped.
async fn forward_outbound(forwarder: &UdpSocket, datagram: &[u8]) {
    let packet = match parse_udp_packet(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            debug!("Dropping malformed client datagram: {:#}", e);
            return;
        }
    };

    if packet.is_fragmented() {
        debug!("Dropping fragmented datagram (FRAG={})", packet.frag);
        return;
    }

    if packet.data.is_empty() {
        return;
    }

    let destination = match &packet.addr {
        TargetAddr::Ip(addr) => *addr,
        TargetAddr::Domain(host, port) => {
            match resolver::resolve(host, *port, FamilyHint::Any).await {
                Ok(endpoints) => endpoints[0],
                Err(e) => {
                    debug!("Dropping datagram for unresolvable {}: {}", packet.addr, e);
                    return;
                }
            }
        }
    };

    if let Err(e) = forwarder.send_to(&packet.data, destination).await {
        debug!("UDP send to {} failed: {}", destination, e);
    }
}

/// Frame one remote datagram and return it to the client's UDP endpoint.
async fn forward_inbound(
    listener: &UdpSocket,
    client_endpoint: Option<SocketAddr>,
    from: SocketAddr,
    payload: &[u8],
) {
    let client_endpoint = match client_endpoint {
        Some(endpoint) => endpoint,
        None => {
            debug!("Dropping inbound datagram from {}: client endpoint unknown", from);
            return;
        }
    };

    let packet = UdpPacket::new(TargetAddr::from(from), Bytes::copy_from_slice(payload));
    let frame = encode_udp_packet(&packet);

    if let Err(e) = listener.send_to(&frame, client_endpoint).await {
        debug!("UDP send to client {} failed: {}", client_endpoint, e);
    }
}

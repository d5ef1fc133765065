//! Session driver
//!
//! Walks one accepted client connection through the SOCKS5 protocol
//! phases: method negotiation, optional authentication, request parsing
//! and command dispatch. The phases are strictly sequential; once a
//! command is dispatched, ownership of the client socket moves into the
//! relay for the rest of the connection's lifetime.

use crate::config::ServerConfig;
use crate::resolver::FamilyHint;
use crate::socks::auth::{self, AuthMethod};
use crate::socks::bind::handle_bind;
use crate::socks::command::parse_request;
use crate::socks::tcp_relay::handle_connect;
use crate::socks::types::SocksCommand;
use crate::socks::udp::handle_udp_associate;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Drive one client connection through the SOCKS5 protocol.
///
/// Any handshake failure closes the connection; command failures have
/// already been answered with a reply code by the handler that raised
/// them.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
) -> Result<()> {
    let control_local = stream.local_addr()?;

    let method = auth::negotiate(&mut stream, &config)
        .await
        .with_context(|| "Method negotiation failed")?;

    debug!("Negotiated method {:?} with {}", method, peer);

    if method == AuthMethod::Password {
        let credentials = config
            .credentials
            .as_ref()
            .with_context(|| "No credentials configured")?;
        auth::password::authenticate(&mut stream, credentials)
            .await
            .with_context(|| "Authentication failed")?;
    }

    let (command, target) = parse_request(&mut stream)
        .await
        .with_context(|| "Failed to parse request")?;

    info!("SOCKS5 {} request from {} to {}", command, peer, target);

    match command {
        SocksCommand::Connect => {
            handle_connect(
                stream,
                target,
                FamilyHint::from(control_local.ip()),
                &config,
            )
            .await
        }
        SocksCommand::Bind => handle_bind(stream).await,
        SocksCommand::UdpAssociate => handle_udp_associate(stream, target, control_local).await,
    }
}

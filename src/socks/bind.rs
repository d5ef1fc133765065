//! BIND handler
//!
//! Implements the BIND command: a one-shot listener announced to the
//! client in a first reply, then a second reply describing the accepted
//! peer (or the failure) once it arrives or the deadline passes.

use crate::error::ReplyCode;
use crate::socks::command::send_reply;
use crate::socks::consts::BIND_DEADLINE_SECS;
use crate::socks::tcp_relay::relay_tcp;
use anyhow::{bail, Result};
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Local address of the most recent successful CONNECT.
///
/// BIND listeners are opened on this address so the peer contacts the
/// same interface the outbound connection used. Written by every CONNECT
/// success; concurrent writers race benignly (last one wins).
static LAST_CONNECT_LOCAL: RwLock<Option<IpAddr>> = RwLock::new(None);

/// Record the local address of a successful outbound CONNECT.
pub fn record_connect_local(addr: IpAddr) {
    let mut cell = LAST_CONNECT_LOCAL
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *cell = Some(addr);
}

fn last_connect_local() -> Option<IpAddr> {
    *LAST_CONNECT_LOCAL
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle the BIND command.
///
/// Without a prior CONNECT in this process there is no address to listen
/// on and the request is refused with reply code 0x07.
pub async fn handle_bind<S>(client: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    bind_on(client, last_connect_local()).await
}

async fn bind_on<S>(mut client: S, local: Option<IpAddr>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let local = match local {
        Some(addr) => addr,
        None => {
            warn!("BIND refused: no prior CONNECT in this process");
            send_reply(&mut client, ReplyCode::CommandNotSupported, None).await?;
            bail!("BIND without a prior CONNECT");
        }
    };

    let listener = match TcpListener::bind((local, 0)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("BIND listener on {} failed: {}", local, e);
            send_reply(&mut client, ReplyCode::from(&e), None).await?;
            return Err(e.into());
        }
    };
    let listen_addr = listener.local_addr()?;

    // First reply announces the listener
    send_reply(&mut client, ReplyCode::Succeeded, Some(listen_addr)).await?;
    debug!("BIND listening on {}", listen_addr);

    let deadline = Duration::from_secs(BIND_DEADLINE_SECS);
    match tokio::time::timeout(deadline, listener.accept()).await {
        Ok(Ok((peer_stream, peer_addr))) => {
            // The listener is one-shot; drop it before relaying
            drop(listener);
            send_reply(&mut client, ReplyCode::Succeeded, Some(peer_addr)).await?;
            info!("BIND accepted peer {}", peer_addr);
            relay_tcp(client, peer_stream).await
        }
        Ok(Err(e)) => {
            warn!("BIND accept failed: {}", e);
            send_reply(&mut client, ReplyCode::from(&e), None).await?;
            Err(e.into())
        }
        Err(_) => {
            debug!("BIND deadline expired on {}", listen_addr);
            send_reply(&mut client, ReplyCode::TtlExpired, None).await?;
            bail!("BIND deadline expired");
        }
    }
}

//! TCP relay for the SOCKS5 CONNECT command
//!
//! Handles CONNECT requests by dialing the target and relaying data
//! bidirectionally until either side closes.

use crate::config::ServerConfig;
use crate::error::ReplyCode;
use crate::resolver::{self, FamilyHint};
use crate::socks::bind;
use crate::socks::command::send_reply;
use crate::socks::types::TargetAddr;
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Handle the CONNECT command.
///
/// Resolves the target when it is a domain name (preferring the control
/// channel's address family), dials the endpoints in order, replies with
/// the local endpoint of the established connection and relays until
/// either side closes. On failure the client receives a reply whose code
/// is derived from the resolver or connect error.
pub async fn handle_connect<S>(
    mut client: S,
    target: TargetAddr,
    family_hint: FamilyHint,
    config: &ServerConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let endpoints = match &target {
        TargetAddr::Ip(addr) => vec![*addr],
        TargetAddr::Domain(host, port) => {
            match resolver::resolve(host, *port, family_hint).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    warn!("Cannot resolve {}: {}", target, e);
                    send_reply(&mut client, e.reply_code(), None).await?;
                    return Err(e).with_context(|| format!("Failed to resolve {}", target));
                }
            }
        }
    };

    let remote = match connect_first(&endpoints, config.request_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot connect to {}: {}", target, e);
            send_reply(&mut client, ReplyCode::from(&e), None).await?;
            return Err(e).with_context(|| format!("Failed to connect to {}", target));
        }
    };

    // The OS-assigned local endpoint doubles as the reply's BND.ADDR and
    // as the listening address for later BIND requests.
    let local_addr = remote.local_addr()?;
    bind::record_connect_local(local_addr.ip());

    send_reply(&mut client, ReplyCode::Succeeded, Some(local_addr)).await?;

    info!("CONNECT established to {}", target);

    relay_tcp(client, remote).await
}

/// Dial each endpoint in order and return the first stream that connects.
async fn connect_first(endpoints: &[SocketAddr], timeout_secs: u64) -> io::Result<TcpStream> {
    let timeout = Duration::from_secs(timeout_secs);
    let mut last_err: Option<io::Error> = None;

    for &endpoint in endpoints {
        match tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => {
                debug!("Connect to {} failed: {}", endpoint, e);
                last_err = Some(e);
            }
            Err(_) => {
                debug!("Connect to {} timed out", endpoint);
                last_err = Some(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NetworkUnreachable, "no endpoints to connect")
    }))
}

/// Relay data bidirectionally between two streams.
///
/// Both directions are pumped concurrently; the first EOF or error on
/// either side ends the relay and drops both streams, which closes them.
pub async fn relay_tcp<A, B>(a: A, b: B) -> Result<()>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = tokio::io::copy(&mut a_read, &mut b_write);
    let b_to_a = tokio::io::copy(&mut b_read, &mut a_write);

    tokio::select! {
        result = a_to_b => {
            match result {
                Ok(bytes) => debug!("client->remote finished: {} bytes", bytes),
                Err(e) => debug!("client->remote error: {}", e),
            }
        }
        result = b_to_a => {
            match result {
                Ok(bytes) => debug!("remote->client finished: {} bytes", bytes),
                Err(e) => debug!("remote->client error: {}", e),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config() -> ServerConfig {
        ServerConfig {
            request_timeout: 1,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_relay_tcp_bidirectional() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        client_a.write_all(b"message A->B").await.unwrap();
        let mut buf_b = vec![0u8; 12];
        client_b.read_exact(&mut buf_b).await.unwrap();
        assert_eq!(&buf_b, b"message A->B");

        client_b.write_all(b"message B->A").await.unwrap();
        let mut buf_a = vec![0u8; 12];
        client_a.read_exact(&mut buf_a).await.unwrap();
        assert_eq!(&buf_a, b"message B->A");

        drop(client_a);
        drop(client_b);

        let _ = tokio::time::timeout(Duration::from_millis(100), relay_handle).await;
    }

    #[tokio::test]
    async fn test_relay_tcp_large_data() {
        let (mut client_a, server_a) = duplex(65536);
        let (mut client_b, server_b) = duplex(65536);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        let large_data = vec![0xAB; 50000];
        let writer = {
            let data = large_data.clone();
            tokio::spawn(async move {
                client_a.write_all(&data).await.unwrap();
                client_a
            })
        };

        let mut received = vec![0u8; 50000];
        client_b.read_exact(&mut received).await.unwrap();
        assert_eq!(received, large_data);

        drop(writer.await.unwrap());
        drop(client_b);

        let _ = tokio::time::timeout(Duration::from_millis(100), relay_handle).await;
    }

    #[tokio::test]
    async fn test_relay_tcp_closes_on_eof() {
        let (mut client_a, server_a) = duplex(1024);
        let (client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        client_a.write_all(b"data").await.unwrap();
        drop(client_a);
        drop(client_b);

        let result = tokio::time::timeout(Duration::from_millis(100), relay_handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handle_connect_success_replies_local_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let (mut client, server) = duplex(1024);
        let target = TargetAddr::Ip(target_addr);
        let handle = tokio::spawn(async move {
            handle_connect(server, target, FamilyHint::V4, &test_config()).await
        });

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x05);
        assert_eq!(reply[1], 0x00);
        assert_eq!(reply[3], 0x01);
        assert_eq!(&reply[4..8], &Ipv4Addr::LOCALHOST.octets());

        drop(client);
        let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
    }

    #[tokio::test]
    async fn test_handle_connect_refused_replies_0x05() {
        // Grab a port that nothing is listening on
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = probe.local_addr().unwrap();
        drop(probe);

        let (mut client, server) = duplex(1024);
        let target = TargetAddr::Ip(dead_addr);
        let result = handle_connect(server, target, FamilyHint::V4, &test_config()).await;
        assert!(result.is_err());

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x05);
    }

    #[tokio::test]
    async fn test_handle_connect_unresolvable_domain_replies_0x04() {
        let (mut client, server) = duplex(1024);
        let target = TargetAddr::domain("nope.invalid".to_string(), 80);
        let result = handle_connect(server, target, FamilyHint::Any, &test_config()).await;
        assert!(result.is_err());

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(
            reply,
            [0x05, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }
}

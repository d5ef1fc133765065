//! Listener and accept loop
//!
//! One acceptor per address family. The IPv6 acceptor handles IPv4
//! clients too on platforms whose dual-stack sockets permit it; elsewhere
//! a separate IPv4 acceptor runs alongside. Each accepted connection gets
//! its own session task.

use crate::config::ServerConfig;
use crate::socks::handler::handle_connection;
use anyhow::{Context, Result};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info, warn};

/// A bound SOCKS5 listener
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Bind a listener on the given address.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: Arc<ServerConfig>) -> io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Server { listener, config })
    }

    /// The local address this server listens on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, spawning one session task each.
    ///
    /// Accept errors are logged and the loop continues; a session task's
    /// outcome never affects the acceptor.
    pub async fn run(self) -> Result<()> {
        info!("SOCKS5 server listening on {}", self.listener.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, config).await {
                            debug!("Session from {} ended: {:#}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Bind the per-family acceptors for the configured port and run them.
///
/// The IPv6 listener is tried first; when it cannot be created at all the
/// server falls back to IPv4 only. On platforms without dual-stack
/// sockets an IPv4 acceptor is spawned next to the IPv6 one.
pub async fn run_server(config: Arc<ServerConfig>) -> Result<()> {
    let port = config.port;

    match Server::bind((Ipv6Addr::UNSPECIFIED, port), config.clone()).await {
        Ok(server) => {
            if !cfg!(target_os = "linux") {
                match Server::bind((Ipv4Addr::UNSPECIFIED, port), config.clone()).await {
                    Ok(v4_server) => {
                        tokio::spawn(async move {
                            if let Err(e) = v4_server.run().await {
                                error!("IPv4 acceptor failed: {:#}", e);
                            }
                        });
                    }
                    Err(e) => warn!("IPv4 listener unavailable: {}", e),
                }
            }
            server.run().await
        }
        Err(e) => {
            warn!("IPv6 listener unavailable ({}), falling back to IPv4", e);
            let server = Server::bind((Ipv4Addr::UNSPECIFIED, port), config)
                .await
                .with_context(|| format!("Failed to bind port {}", port))?;
            server.run().await
        }
    }
}

//! Test utilities for socksd integration tests

#![allow(dead_code)]

use socksd::{Credentials, Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Configuration without authentication
pub fn no_auth_config() -> ServerConfig {
    ServerConfig {
        request_timeout: 2,
        ..ServerConfig::default()
    }
}

/// Configuration requiring username/password authentication
pub fn password_config(username: &str, password: &str) -> ServerConfig {
    ServerConfig {
        credentials: Some(
            Credentials::new(username.to_string(), password.to_string()).unwrap(),
        ),
        request_timeout: 2,
        ..ServerConfig::default()
    }
}

/// Start a SOCKS5 server on an ephemeral loopback port
pub async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0", Arc::new(config)).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// Start a TCP echo server on an ephemeral loopback port
pub async fn spawn_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Start a UDP echo server on an ephemeral loopback port
pub async fn spawn_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 65535];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });
    addr
}

/// Connect to the server and complete a no-auth negotiation
pub async fn negotiate_no_auth(server: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(server).await.unwrap();
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await.unwrap();
    assert_eq!(choice, [0x05, 0x00]);

    stream
}

/// Build a CONNECT request for an IPv4 endpoint
pub fn connect_request(target: SocketAddr) -> Vec<u8> {
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    match target {
        SocketAddr::V4(addr) => {
            request.extend_from_slice(&addr.ip().octets());
            request.extend_from_slice(&addr.port().to_be_bytes());
        }
        SocketAddr::V6(_) => panic!("IPv4 target expected"),
    }
    request
}

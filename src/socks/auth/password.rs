//! Username/password authentication handler
//!
//! Implements RFC 1929 username/password authentication for SOCKS5.

use crate::config::Credentials;
use crate::error::Socks5Error;
use crate::socks::consts::SOCKS5_AUTH_VERSION;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Authentication result codes
const AUTH_SUCCESS: u8 = 0x00;
const AUTH_FAILURE: u8 = 0x01;

/// Perform username/password authentication.
///
/// # Protocol
///
/// Client sends:
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// Server responds:
/// ```text
/// +----+--------+
/// |VER | STATUS |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
///
/// Credentials are compared byte-wise against the configured pair with no
/// normalization. A version mismatch or zero-length field closes the
/// connection without a status reply; a mismatch is answered with
/// STATUS=1 before closing.
pub async fn authenticate<S>(stream: &mut S, credentials: &Credentials) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;

    let version = head[0];
    let username_len = head[1] as usize;

    if version != SOCKS5_AUTH_VERSION {
        return Err(Socks5Error::UnsupportedAuthVersion(version).into());
    }

    if username_len == 0 {
        return Err(Socks5Error::Malformed("zero-length username").into());
    }

    let mut username = vec![0u8; username_len];
    stream.read_exact(&mut username).await?;

    let mut len_buf = [0u8; 1];
    stream.read_exact(&mut len_buf).await?;
    let password_len = len_buf[0] as usize;

    if password_len == 0 {
        return Err(Socks5Error::Malformed("zero-length password").into());
    }

    let mut password = vec![0u8; password_len];
    stream.read_exact(&mut password).await?;

    if credentials.matches(&username, &password) {
        send_status(stream, AUTH_SUCCESS).await?;
        info!(
            "User `{}` authenticated",
            String::from_utf8_lossy(&username)
        );
        Ok(())
    } else {
        debug!(
            "Authentication rejected for user `{}`",
            String::from_utf8_lossy(&username)
        );
        send_status(stream, AUTH_FAILURE).await?;
        Err(Socks5Error::AuthFailed.into())
    }
}

/// Send the sub-negotiation status to the client
async fn send_status<S: AsyncWrite + Unpin>(stream: &mut S, status: u8) -> Result<()> {
    stream.write_all(&[SOCKS5_AUTH_VERSION, status]).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn credentials() -> Credentials {
        Credentials::new("user".to_string(), "pass".to_string()).unwrap()
    }

    fn auth_request(username: &[u8], password: &[u8]) -> Vec<u8> {
        let mut request = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        request.extend_from_slice(username);
        request.push(password.len() as u8);
        request.extend_from_slice(password);
        request
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(&auth_request(b"user", b"pass")).await.unwrap();

        authenticate(&mut server, &credentials()).await.unwrap();

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0x00]);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(&auth_request(b"user", b"nope")).await.unwrap();

        let result = authenticate(&mut server, &credentials()).await;
        assert!(result.is_err());

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0x01]);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_username() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(&auth_request(b"x", b"pass")).await.unwrap();

        let result = authenticate(&mut server, &credentials()).await;
        assert!(result.is_err());

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0x01]);
    }

    #[tokio::test]
    async fn test_authenticate_bad_version_closes_without_status() {
        let (mut client, mut server) = duplex(1024);
        let mut request = auth_request(b"user", b"pass");
        request[0] = 0x05;
        client.write_all(&request).await.unwrap();

        let result = authenticate(&mut server, &credentials()).await;
        assert!(result.is_err());

        drop(server);
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_zero_length_username() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(&[SOCKS5_AUTH_VERSION, 0x00]).await.unwrap();

        let result = authenticate(&mut server, &credentials()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_non_utf8_bytes_compare() {
        // Raw bytes are compared directly; invalid UTF-8 just fails to match
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(&auth_request(&[0xFF, 0xFE], b"pass"))
            .await
            .unwrap();

        let result = authenticate(&mut server, &credentials()).await;
        assert!(result.is_err());

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0x01]);
    }
}

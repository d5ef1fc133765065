//! Error types for socksd
//!
//! This module defines the protocol error types and the mapping from
//! I/O errors to SOCKS5 reply codes.

use std::io;
use thiserror::Error;

/// SOCKS5 protocol errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Unsupported authentication sub-negotiation version
    #[error("Unsupported auth sub-negotiation version: {0}")]
    UnsupportedAuthVersion(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Authentication failed
    #[error("Authentication failed")]
    AuthFailed,

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Malformed protocol message
    #[error("Malformed message: {0}")]
    Malformed(&'static str),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl From<&io::Error> for ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ReplyCode::ConnectionNotAllowed,
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown => {
                ReplyCode::NetworkUnreachable
            }
            io::ErrorKind::HostUnreachable | io::ErrorKind::NotFound => ReplyCode::HostUnreachable,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => ReplyCode::ConnectionRefused,
            io::ErrorKind::TimedOut => ReplyCode::TtlExpired,
            io::ErrorKind::Unsupported => ReplyCode::AddressTypeNotSupported,
            _ => ReplyCode::GeneralFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_code_to_u8() {
        assert_eq!(u8::from(ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(ReplyCode::GeneralFailure), 0x01);
        assert_eq!(u8::from(ReplyCode::ConnectionNotAllowed), 0x02);
        assert_eq!(u8::from(ReplyCode::NetworkUnreachable), 0x03);
        assert_eq!(u8::from(ReplyCode::HostUnreachable), 0x04);
        assert_eq!(u8::from(ReplyCode::ConnectionRefused), 0x05);
        assert_eq!(u8::from(ReplyCode::TtlExpired), 0x06);
        assert_eq!(u8::from(ReplyCode::CommandNotSupported), 0x07);
        assert_eq!(u8::from(ReplyCode::AddressTypeNotSupported), 0x08);
    }

    #[test]
    fn test_reply_code_from_io_error() {
        let cases = [
            (io::ErrorKind::PermissionDenied, ReplyCode::ConnectionNotAllowed),
            (io::ErrorKind::NetworkUnreachable, ReplyCode::NetworkUnreachable),
            (io::ErrorKind::NetworkDown, ReplyCode::NetworkUnreachable),
            (io::ErrorKind::HostUnreachable, ReplyCode::HostUnreachable),
            (io::ErrorKind::NotFound, ReplyCode::HostUnreachable),
            (io::ErrorKind::ConnectionRefused, ReplyCode::ConnectionRefused),
            (io::ErrorKind::ConnectionReset, ReplyCode::ConnectionRefused),
            (io::ErrorKind::ConnectionAborted, ReplyCode::ConnectionRefused),
            (io::ErrorKind::TimedOut, ReplyCode::TtlExpired),
            (io::ErrorKind::Unsupported, ReplyCode::AddressTypeNotSupported),
            (io::ErrorKind::WouldBlock, ReplyCode::GeneralFailure),
            (io::ErrorKind::Other, ReplyCode::GeneralFailure),
        ];

        for (kind, expected) in cases {
            let err = io::Error::new(kind, "test error");
            assert_eq!(ReplyCode::from(&err), expected);
        }
    }

    #[test]
    fn test_socks5_error_display() {
        let err = Socks5Error::UnsupportedVersion(4);
        assert_eq!(format!("{}", err), "Unsupported SOCKS version: 4");

        let err = Socks5Error::NoAcceptableMethod;
        assert_eq!(format!("{}", err), "No acceptable authentication method");

        let err = Socks5Error::AuthFailed;
        assert_eq!(format!("{}", err), "Authentication failed");

        let err = Socks5Error::CommandNotSupported(0x09);
        assert_eq!(format!("{}", err), "Command not supported: 9");

        let err = Socks5Error::AddressTypeNotSupported(0x02);
        assert_eq!(format!("{}", err), "Address type not supported: 2");

        let err = Socks5Error::InvalidDomain("bad".to_string());
        assert_eq!(format!("{}", err), "Invalid domain name: bad");
    }
}

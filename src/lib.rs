//! # socksd - SOCKS5 Proxy Server
//!
//! socksd is a standalone SOCKS5 proxy server implementing RFC 1928 and the
//! RFC 1929 username/password authentication sub-protocol. Each accepted
//! client connection is driven through method negotiation, optional
//! authentication and request parsing, then handed to one of three relay
//! engines:
//!
//! - **CONNECT**: outbound TCP relay to the requested endpoint
//! - **BIND**: one-shot inbound listener with a two-phase reply
//! - **UDP ASSOCIATE**: framed datagram relay tied to the control connection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksd::{run_server, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ServerConfig::default());
//!     run_server(config).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Acceptor -> Session (negotiate/auth/request) -> Relay -> Target
//! ```
//!
//! The acceptor spawns one session task per connection; a session owns its
//! client stream until dispatch, at which point socket ownership moves into
//! the relay task for the remainder of the connection's lifetime.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod resolver;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{Credentials, ServerConfig};
pub use error::{ReplyCode, Socks5Error};
pub use server::{run_server, Server};

/// Version of the socksd crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "socksd");
    }
}

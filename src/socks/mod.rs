//! SOCKS5 protocol engine
//!
//! This module implements the per-connection SOCKS5 state machine and the
//! three relay engines behind it. The handler drives negotiation,
//! authentication and request parsing on the client stream, then hands
//! the socket to the CONNECT, BIND or UDP ASSOCIATE path.

pub mod auth;
pub mod bind;
pub mod command;
pub mod consts;
pub mod handler;
pub mod tcp_relay;
pub mod types;
pub mod udp;

pub use auth::{negotiate, AuthMethod};
pub use bind::handle_bind;
pub use command::{encode_reply, parse_request, send_reply};
pub use consts::*;
pub use handler::handle_connection;
pub use tcp_relay::{handle_connect, relay_tcp};
pub use types::{SocksCommand, TargetAddr};
pub use udp::handle_udp_associate;

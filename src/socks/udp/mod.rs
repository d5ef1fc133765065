//! UDP ASSOCIATE module
//!
//! Datagram framing and the UDP relay that backs the UDP ASSOCIATE
//! command.

mod packet;
mod relay;

pub use packet::{encode_udp_packet, parse_udp_packet, UdpPacket};
pub use relay::handle_udp_associate;

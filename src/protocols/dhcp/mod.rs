//! DHCP: client, server, relay, lease pool, and the option/packet wire
//! format they share.

pub mod client;
pub mod options;
pub mod packet;
pub mod pool;
pub mod relay;
pub mod server;

//! DHCP relay: rewrites broadcast client messages into unicast toward a
//! configured forwarder, stamping `giaddr`, per §4.10.

use crate::addresses::IPv4Address;

use super::packet::DhcpMessage;

pub struct Relay {
    pub forwarder: IPv4Address,
    pub own_address: IPv4Address,
}

impl Relay {
    pub fn new(forwarder: IPv4Address, own_address: IPv4Address) -> Self {
        Self { forwarder, own_address }
    }

    /// Rewrites a client broadcast into a message addressed to the
    /// forwarder, stamping our own address as `giaddr` so the server can
    /// select the right pool and the reply can be routed back.
    pub fn forward_client_message(&self, mut message: DhcpMessage) -> (IPv4Address, DhcpMessage) {
        message.giaddr = self.own_address;
        (self.forwarder, message)
    }

    /// A reply from the server is delivered back on the arrival interface
    /// unchanged (the relay does not alter `giaddr` on the return path).
    pub fn forward_server_reply(&self, message: DhcpMessage) -> DhcpMessage {
        message
    }
}

//! The BOOTP/DHCP message itself. Grounded on the teacher's
//! `core::message_type::DhcpV4Packet` header field layout (`op`, `xid`,
//! `ciaddr`/`yiaddr`/`siaddr`/`giaddr`, `chaddr`), simplified to carry a
//! real [`MacAddress`] instead of the teacher's 16-byte padded field
//! (there's no mixed-hardware-type BOOTP traffic in this simulator).

use crate::addresses::{IPv4Address, MacAddress};

use super::options::{DhcpMessageType, DhcpOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootpOp {
    Request,
    Reply,
}

#[derive(Debug, Clone)]
pub struct DhcpMessage {
    pub op: BootpOp,
    pub xid: u32,
    pub ciaddr: IPv4Address,
    pub yiaddr: IPv4Address,
    pub siaddr: IPv4Address,
    pub giaddr: IPv4Address,
    pub chaddr: MacAddress,
    pub options: DhcpOptions,
}

impl DhcpMessage {
    pub fn new_request(xid: u32, chaddr: MacAddress) -> Self {
        Self {
            op: BootpOp::Request,
            xid,
            ciaddr: IPv4Address::UNSPECIFIED,
            yiaddr: IPv4Address::UNSPECIFIED,
            siaddr: IPv4Address::UNSPECIFIED,
            giaddr: IPv4Address::UNSPECIFIED,
            chaddr,
            options: DhcpOptions::empty(),
        }
    }

    pub fn new_reply(xid: u32, chaddr: MacAddress) -> Self {
        Self { op: BootpOp::Reply, ..Self::new_request(xid, chaddr) }
    }

    pub fn message_type(&self) -> Option<DhcpMessageType> {
        self.options.message_type()
    }

    /// Relays have stamped `giaddr`; a non-zero value indicates this
    /// request arrived through a relay rather than directly from the
    /// client's own subnet.
    pub fn is_relayed(&self) -> bool {
        self.giaddr != IPv4Address::UNSPECIFIED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::dhcp::options::DhcpOption;

    #[test]
    fn relay_detection_follows_giaddr() {
        let mut msg = DhcpMessage::new_request(1, MacAddress::new([1; 6]));
        assert!(!msg.is_relayed());
        msg.giaddr = IPv4Address::new(10, 0, 0, 1);
        assert!(msg.is_relayed());
    }

    #[test]
    fn message_type_reads_through_options() {
        let mut msg = DhcpMessage::new_request(1, MacAddress::new([1; 6]));
        msg.options.add(DhcpOption::MessageType(vec![1]));
        assert_eq!(msg.message_type(), Some(DhcpMessageType::Discover));
    }
}

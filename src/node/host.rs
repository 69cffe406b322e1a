//! End-host: one or more network interfaces, an ARP cache per host, and
//! the ICMP echo tracker that backs `ping`. Grounded on §4.11's
//! `ComputerHost`/`ServerHost` split — both are modeled as this same
//! `Host`, since neither adds fields the spec gives the other.

use std::cell::RefCell;
use std::rc::Rc;

use crate::addresses::IPv4Address;
use crate::errors::SimError;
use crate::messages::{IPv4Message, IPv4Protocol};
use crate::network_interface::NetworkInterface;
use crate::protocols::arp::ArpTable;
use crate::protocols::icmp::{EchoTracker, IcmpMessage, IcmpType};
use crate::protocols::ipv4::ReassemblyBuffers;

pub struct Host {
    pub name: String,
    pub interfaces: Vec<NetworkInterface>,
    pub default_gateway: Option<IPv4Address>,
    pub arp: Rc<RefCell<ArpTable>>,
    pub echo: Rc<RefCell<EchoTracker>>,
    pub reassembly: ReassemblyBuffers,
}

impl Host {
    pub fn new(name: impl Into<String>, interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            name: name.into(),
            interfaces,
            default_gateway: None,
            arp: Rc::new(RefCell::new(ArpTable::new())),
            echo: Rc::new(RefCell::new(EchoTracker::new())),
            reassembly: ReassemblyBuffers::new(),
        }
    }

    /// Which local interface (by index) and next hop a destination routes
    /// through: the first interface whose configured subnet contains
    /// `dst`, or the default gateway reachable out the primary interface.
    pub fn route_for(&self, dst: IPv4Address) -> Option<(usize, IPv4Address)> {
        for (idx, iface) in self.interfaces.iter().enumerate() {
            if iface.contains_subnet(&dst).is_some() {
                return Some((idx, dst));
            }
        }
        self.default_gateway.map(|gw| (0, gw))
    }

    pub fn has_address(&self, addr: &IPv4Address) -> bool {
        self.interfaces.iter().any(|iface| iface.has_address(addr))
    }

    /// Builds the IPv4 datagram for an outbound echo request. The caller
    /// supplies the identifier/sequence (from [`EchoTracker::track`]) and
    /// is responsible for handing the result to ARP resolution and the
    /// link.
    pub fn build_echo_request(
        &self,
        src_iface: usize,
        dst: IPv4Address,
        identifier: u16,
        sequence: u16,
        payload: Vec<u8>,
    ) -> Result<IPv4Message, SimError> {
        let src = self.interfaces[src_iface].primary_address().ok_or(SimError::InvalidConfiguration {
            reason: "source interface has no address".into(),
        })?;
        let icmp = IcmpMessage::build(IcmpType::EchoRequest, identifier, sequence, payload);
        IPv4Message::builder().src(src).dst(dst).protocol(IPv4Protocol::Icmp).payload(icmp.to_bytes()).build()
    }

    /// Handles an inbound datagram addressed to us: replies to echo
    /// requests, completes the echo tracker on replies, and otherwise
    /// ignores the datagram.
    pub fn handle_inbound(&mut self, datagram: &IPv4Message) -> Option<IPv4Message> {
        if datagram.protocol() != IPv4Protocol::Icmp {
            return None;
        }
        let icmp = IcmpMessage::from_bytes(datagram.payload())?;
        match icmp.kind {
            IcmpType::EchoRequest => {
                let reply = IcmpMessage::echo_reply_to(&icmp);
                IPv4Message::builder()
                    .src(datagram.dst())
                    .dst(datagram.src())
                    .protocol(IPv4Protocol::Icmp)
                    .payload(reply.to_bytes())
                    .build()
                    .ok()
            }
            IcmpType::EchoReply => {
                self.echo.borrow_mut().complete(icmp);
                None
            }
            IcmpType::TimeExceeded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{IPv4Mask, MacAddress};
    use crate::hardware_interface::HardwareInterface;

    fn host() -> Host {
        let mut iface = NetworkInterface::new(HardwareInterface::new("eth0", MacAddress::new([1; 6])));
        iface.add_address(IPv4Address::new(192, 168, 1, 10), IPv4Mask::from_prefix(24).unwrap()).unwrap();
        Host::new("pc1", vec![iface])
    }

    #[test]
    fn on_link_destination_routes_directly() {
        let h = host();
        let (idx, next_hop) = h.route_for(IPv4Address::new(192, 168, 1, 20)).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(next_hop, IPv4Address::new(192, 168, 1, 20));
    }

    #[test]
    fn off_link_destination_routes_via_gateway() {
        let mut h = host();
        h.default_gateway = Some(IPv4Address::new(192, 168, 1, 1));
        let (_, next_hop) = h.route_for(IPv4Address::new(8, 8, 8, 8)).unwrap();
        assert_eq!(next_hop, IPv4Address::new(192, 168, 1, 1));
    }

    #[test]
    fn echo_request_gets_a_reply_datagram() {
        let mut h = host();
        let request = h.build_echo_request(0, IPv4Address::new(192, 168, 1, 10), 5, 0, vec![1, 2]).unwrap();
        let reply = h.handle_inbound(&request).unwrap();
        let icmp = IcmpMessage::from_bytes(reply.payload()).unwrap();
        assert_eq!(icmp.kind, IcmpType::EchoReply);
        assert_eq!(icmp.identifier, 5);
    }
}

//! Router: multiple network interfaces, a longest-prefix-match routing
//! table, and per-fragment forwarding. Grounded on §4.11 and
//! `protocols::ipv4`'s `RoutingTable`. Routers forward each fragment of a
//! datagram independently rather than reassembling in transit —
//! reassembly is an end-host concern (`Host::reassembly`), matching real
//! IPv4 forwarding.

use std::cell::RefCell;
use std::rc::Rc;

use crate::addresses::IPv4Address;
use crate::errors::SimError;
use crate::messages::IPv4Message;
use crate::network_interface::NetworkInterface;
use crate::protocols::arp::ArpTable;
use crate::protocols::ipv4::RoutingTable;

pub struct Router {
    pub name: String,
    pub interfaces: Vec<NetworkInterface>,
    pub routing_table: RoutingTable,
    pub arp: Rc<RefCell<ArpTable>>,
}

impl Router {
    pub fn new(name: impl Into<String>, interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            name: name.into(),
            interfaces,
            routing_table: RoutingTable::new(),
            arp: Rc::new(RefCell::new(ArpTable::new())),
        }
    }

    pub fn has_address(&self, addr: &IPv4Address) -> bool {
        self.interfaces.iter().any(|iface| iface.has_address(addr))
    }

    /// Decrements TTL and resolves the egress interface + next hop for a
    /// datagram not addressed to us. Per §4.7: a datagram whose TTL would
    /// reach zero is dropped with [`SimError::TtlExceeded`]; one with no
    /// matching route is dropped with [`SimError::NoRoute`].
    pub fn forward(&self, datagram: &IPv4Message) -> Result<(usize, IPv4Address, IPv4Message), SimError> {
        if datagram.ttl() <= 1 {
            return Err(SimError::TtlExceeded { destination: datagram.dst() });
        }
        let route = self.routing_table.lookup(&datagram.dst()).ok_or(SimError::NoRoute { destination: datagram.dst() })?;
        let next_hop = route.next_hop.unwrap_or(datagram.dst());
        let forwarded = datagram.with_ttl(datagram.ttl() - 1);
        Ok((route.interface, next_hop, forwarded))
    }
}

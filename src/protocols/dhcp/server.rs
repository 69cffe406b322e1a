//! DHCP server: DISCOVER → OFFER, REQUEST → ACK, RELEASE handling over a
//! set of address pools. Grounded on §4.10 and the teacher's hook-chain
//! dispatch style (each DHCP message type is handled by a focused
//! function rather than one giant match, mirroring `HookRegistry`'s one-
//! hook-per-concern layout).

use crate::addresses::IPv4Address;
use crate::errors::SimError;

use super::options::{DhcpMessageType, DhcpOption};
use super::packet::DhcpMessage;
use super::pool::Pool;

pub struct DhcpServer {
    pools: Vec<Pool>,
    server_id: IPv4Address,
}

impl DhcpServer {
    pub fn new(server_id: IPv4Address) -> Self {
        Self { pools: Vec::new(), server_id }
    }

    pub fn add_pool(&mut self, pool: Pool) {
        self.pools.push(pool);
    }

    /// Selects the pool matching the inbound interface's subnet, or (for
    /// a relayed request) the pool whose subnet contains `giaddr`.
    fn select_pool(&mut self, request: &DhcpMessage, inbound_subnet: IPv4Address) -> Option<&mut Pool> {
        let key = if request.is_relayed() { request.giaddr } else { inbound_subnet };
        self.pools.iter_mut().find(|p| p.covers(&key))
    }

    pub fn handle(&mut self, request: &DhcpMessage, inbound_subnet: IPv4Address, now: f64) -> Result<Option<DhcpMessage>, SimError> {
        match request.message_type() {
            Some(DhcpMessageType::Discover) => self.handle_discover(request, inbound_subnet, now).map(Some),
            Some(DhcpMessageType::Request) => self.handle_request(request, inbound_subnet, now),
            Some(DhcpMessageType::Release) => {
                self.handle_release(request, inbound_subnet);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_discover(&mut self, request: &DhcpMessage, inbound_subnet: IPv4Address, now: f64) -> Result<DhcpMessage, SimError> {
        let server_id = self.server_id;
        let pool = self.select_pool(request, inbound_subnet).ok_or(SimError::DhcpNoAddress)?;
        let offered = pool.offer(request.chaddr, now)?;

        let mut reply = DhcpMessage::new_reply(request.xid, request.chaddr);
        reply.yiaddr = offered;
        reply.giaddr = request.giaddr;
        reply.options.set_message_type(DhcpMessageType::Offer);
        reply.options.add(DhcpOption::ServerIdentifier(server_id.octets().to_vec()));
        reply.options.add(DhcpOption::SubnetMask(pool.netmask.as_address().octets().to_vec()));
        reply.options.add(DhcpOption::Router(pool.gateway.octets().to_vec()));
        Ok(reply)
    }

    fn handle_request(&mut self, request: &DhcpMessage, inbound_subnet: IPv4Address, _now: f64) -> Result<Option<DhcpMessage>, SimError> {
        let requested = request
            .options
            .requested_ip()
            .map(|o| IPv4Address::new(o[0], o[1], o[2], o[3]))
            .unwrap_or(request.ciaddr);
        let server_id = self.server_id;

        let pool = self.select_pool(request, inbound_subnet).ok_or(SimError::DhcpNoAddress)?;
        if pool.commit(request.chaddr, requested).is_err() {
            let mut nak = DhcpMessage::new_reply(request.xid, request.chaddr);
            nak.options.set_message_type(DhcpMessageType::Nak);
            return Ok(Some(nak));
        }

        let mut reply = DhcpMessage::new_reply(request.xid, request.chaddr);
        reply.yiaddr = requested;
        reply.giaddr = request.giaddr;
        reply.options.set_message_type(DhcpMessageType::Ack);
        reply.options.add(DhcpOption::ServerIdentifier(server_id.octets().to_vec()));
        reply.options.add(DhcpOption::SubnetMask(pool.netmask.as_address().octets().to_vec()));
        reply.options.add(DhcpOption::Router(pool.gateway.octets().to_vec()));
        Ok(Some(reply))
    }

    fn handle_release(&mut self, request: &DhcpMessage, inbound_subnet: IPv4Address) {
        if let Some(pool) = self.select_pool(request, inbound_subnet) {
            pool.release(&request.chaddr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{IPv4Mask, MacAddress};

    fn server() -> DhcpServer {
        let mut server = DhcpServer::new(IPv4Address::new(192, 168, 1, 1));
        server.add_pool(Pool::new(
            IPv4Address::new(192, 168, 1, 1),
            IPv4Mask::from_prefix(24).unwrap(),
            IPv4Address::new(192, 168, 1, 10),
            IPv4Address::new(192, 168, 1, 20),
        ));
        server
    }

    #[test]
    fn discover_then_request_commits_a_lease() {
        let mut server = server();
        let mac = MacAddress::new([1; 6]);
        let mut discover = DhcpMessage::new_request(1, mac);
        discover.options.set_message_type(DhcpMessageType::Discover);

        let subnet = IPv4Address::new(192, 168, 1, 1);
        let offer = server.handle(&discover, subnet, 0.0).unwrap().unwrap();
        assert_eq!(offer.message_type(), Some(DhcpMessageType::Offer));

        let mut request = DhcpMessage::new_request(1, mac);
        request.options.set_message_type(DhcpMessageType::Request);
        request.options.add(DhcpOption::RequestedIp(offer.yiaddr.octets().to_vec()));

        let ack = server.handle(&request, subnet, 1.0).unwrap().unwrap();
        assert_eq!(ack.message_type(), Some(DhcpMessageType::Ack));
        assert_eq!(ack.yiaddr, offer.yiaddr);
    }

    #[test]
    fn release_frees_the_address_for_reuse() {
        let mut server = server();
        let mac = MacAddress::new([1; 6]);
        let subnet = IPv4Address::new(192, 168, 1, 1);

        let mut discover = DhcpMessage::new_request(1, mac);
        discover.options.set_message_type(DhcpMessageType::Discover);
        server.handle(&discover, subnet, 0.0).unwrap();

        let mut release = DhcpMessage::new_request(1, mac);
        release.options.set_message_type(DhcpMessageType::Release);
        server.handle(&release, subnet, 1.0).unwrap();

        assert!(server.pools[0].lease_for(&mac).is_none());
    }
}

//! The server-side lease pool: a `{ gateway, netmask, start, end }` range
//! plus a `client_mac → ip` table. Grounded on the teacher's
//! `core::leases::LeaseV4` (kept as a design reference; this version is
//! purely in-memory, no MySQL-backed persistence — see `DESIGN.md`).

use std::collections::HashMap;

use crate::addresses::{IPv4Address, IPv4Mask, MacAddress};
use crate::errors::SimError;

#[derive(Clone)]
pub struct Lease {
    pub address: IPv4Address,
    pub client_mac: MacAddress,
    pub offered_at: f64,
    pub committed: bool,
}

pub struct Pool {
    pub gateway: IPv4Address,
    pub netmask: IPv4Mask,
    pub start: IPv4Address,
    pub end: IPv4Address,
    leases: HashMap<MacAddress, Lease>,
    taken: Vec<IPv4Address>,
}

impl Pool {
    pub fn new(gateway: IPv4Address, netmask: IPv4Mask, start: IPv4Address, end: IPv4Address) -> Self {
        Self { gateway, netmask, start, end, leases: HashMap::new(), taken: Vec::new() }
    }

    pub fn covers(&self, address: &IPv4Address) -> bool {
        self.gateway.in_same_network(&self.netmask, address)
    }

    /// Picks the first free address in `[start, end]`, per §4.10.
    pub fn first_free(&self) -> Option<IPv4Address> {
        let mut candidate = self.start.bits();
        let end = self.end.bits();
        while candidate <= end {
            let addr = IPv4Address::from_bits(candidate);
            if !self.taken.contains(&addr) {
                return Some(addr);
            }
            candidate += 1;
        }
        None
    }

    pub fn offer(&mut self, client_mac: MacAddress, now: f64) -> Result<IPv4Address, SimError> {
        if let Some(existing) = self.leases.get(&client_mac) {
            return Ok(existing.address);
        }
        let address = self.first_free().ok_or(SimError::DhcpNoAddress)?;
        self.taken.push(address);
        self.leases.insert(client_mac, Lease { address, client_mac, offered_at: now, committed: false });
        Ok(address)
    }

    pub fn commit(&mut self, client_mac: MacAddress, address: IPv4Address) -> Result<(), SimError> {
        let lease = self
            .leases
            .get_mut(&client_mac)
            .filter(|l| l.address == address)
            .ok_or(SimError::DhcpNoAddress)?;
        lease.committed = true;
        Ok(())
    }

    pub fn release(&mut self, client_mac: &MacAddress) {
        if let Some(lease) = self.leases.remove(client_mac) {
            self.taken.retain(|a| *a != lease.address);
        }
    }

    pub fn lease_for(&self, client_mac: &MacAddress) -> Option<&Lease> {
        self.leases.get(client_mac)
    }
}

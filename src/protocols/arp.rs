//! Per-interface ARP resolution cache and pending-request queue.
//! Grounded on the pack's `1196c1d0_SlopLabs-slopos` `drivers/src/net/arp.rs`
//! for the resolution-table-plus-pending-queue shape.

use std::collections::HashMap;

use crate::addresses::{IPv4Address, MacAddress};
use crate::listener::Outcome;
use crate::scheduler::{CancelHandle, Scheduler};

const AGE_OUT_PERIOD: f64 = 10.0;
const ENTRY_TIMEOUT: f64 = 300.0;

struct CacheEntry {
    mac: MacAddress,
    last_seen: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
}

/// The wire content of an ARP request/reply — not modeled as a builder
/// like the IPv4/datalink messages since it has no optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub operation: ArpOperation,
    pub sender_mac: MacAddress,
    pub sender_ip: IPv4Address,
    pub target_mac: MacAddress,
    pub target_ip: IPv4Address,
}

impl ArpPacket {
    pub fn request(sender_mac: MacAddress, sender_ip: IPv4Address, target_ip: IPv4Address) -> Self {
        Self { operation: ArpOperation::Request, sender_mac, sender_ip, target_mac: MacAddress::BROADCAST, target_ip }
    }

    pub fn reply_to(&self, sender_mac: MacAddress, sender_ip: IPv4Address) -> Self {
        Self { operation: ArpOperation::Reply, sender_mac, sender_ip, target_mac: self.sender_mac, target_ip: self.sender_ip }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);
        bytes.push(match self.operation {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
        });
        bytes.extend_from_slice(&self.sender_mac.octets());
        bytes.extend_from_slice(&self.sender_ip.octets());
        bytes.extend_from_slice(&self.target_mac.octets());
        bytes.extend_from_slice(&self.target_ip.octets());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 21 {
            return None;
        }
        let operation = match bytes[0] {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            _ => return None,
        };
        let sender_mac = MacAddress::new(bytes[1..7].try_into().ok()?);
        let sender_ip = IPv4Address::new(bytes[7], bytes[8], bytes[9], bytes[10]);
        let target_mac = MacAddress::new(bytes[11..17].try_into().ok()?);
        let target_ip = IPv4Address::new(bytes[17], bytes[18], bytes[19], bytes[20]);
        Some(Self { operation, sender_mac, sender_ip, target_mac, target_ip })
    }
}

/// What the caller should do after `enqueue_request` — avoids ARP owning
/// the datalink-sending concern directly, since that depends on the
/// hardware interface and link the caller already has in hand.
pub enum ArpAction {
    SendUnicast { mac: MacAddress },
    SendBroadcastRequest { target: IPv4Address },
    Queued,
}

#[derive(Default)]
pub struct ArpTable {
    table: HashMap<IPv4Address, CacheEntry>,
    pending: HashMap<IPv4Address, Vec<Vec<u8>>>,
    age_handle: Option<CancelHandle>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the repeating aging job (every 10 virtual seconds, evicts
    /// entries idle more than 300 s). Retains the handle for teardown.
    pub fn start_aging(table: &std::rc::Rc<std::cell::RefCell<Self>>, scheduler: &Scheduler) {
        let weak = std::rc::Rc::downgrade(table);
        let sched = scheduler.clone();
        let handle = scheduler.repeat(AGE_OUT_PERIOD, move || {
            if let Some(table) = weak.upgrade() {
                table.borrow_mut().age_out(sched.delta_time());
            }
        });
        table.borrow_mut().age_handle = Some(handle);
    }

    pub fn age_out(&mut self, now: f64) {
        self.table.retain(|_, entry| now - entry.last_seen <= ENTRY_TIMEOUT);
    }

    pub fn lookup(&self, addr: &IPv4Address) -> Option<MacAddress> {
        self.table.get(addr).map(|e| e.mac)
    }

    /// Per §4.6: broadcast next-hops send immediately; cached next-hops
    /// refresh `last_seen` and send with the cached MAC; everything else
    /// queues the message and triggers a broadcast ARP request.
    pub fn enqueue_request(&mut self, next_hop: IPv4Address, message: Vec<u8>, now: f64) -> ArpAction {
        if next_hop.is_broadcast() {
            return ArpAction::SendUnicast { mac: MacAddress::BROADCAST };
        }
        if let Some(entry) = self.table.get_mut(&next_hop) {
            entry.last_seen = now;
            return ArpAction::SendUnicast { mac: entry.mac };
        }
        self.pending.entry(next_hop).or_default().push(message);
        ArpAction::SendBroadcastRequest { target: next_hop }
    }

    /// Installs a resolved mapping and drains the pending queue for it.
    pub fn resolve(&mut self, addr: IPv4Address, mac: MacAddress, now: f64) -> Vec<Vec<u8>> {
        self.table.insert(addr, CacheEntry { mac, last_seen: now });
        self.pending.remove(&addr).unwrap_or_default()
    }

    pub fn handle_reply(&mut self, target: IPv4Address, mac: MacAddress, now: f64) -> Outcome {
        self.resolve(target, mac, now);
        Outcome::Handled
    }
}

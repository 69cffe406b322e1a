//! BPDU content and the priority-vector ordering used for root/designated
//! election. Grounded on §4.9; field shape cross-checked against the
//! pack's `dddef4da_rust-netlink-netlink-packet-route`
//! `link/link_info/bridge.rs` attribute set (reference only — that crate
//! models netlink attributes, not BPDU wire bytes).

use crate::addresses::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BridgeId {
    pub priority: u16,
    pub mac: MacAddress,
}

impl BridgeId {
    pub fn new(priority: u16, mac: MacAddress) -> Self {
        Self { priority, mac }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortId {
    pub priority: u8,
    pub number: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BpduFlags {
    pub proposal: bool,
    pub agreement: bool,
    pub topology_change: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Root,
    Designated,
    Alternate,
    Backup,
    Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct Bpdu {
    pub root_id: BridgeId,
    pub root_path_cost: u32,
    pub bridge_id: BridgeId,
    pub port_id: PortId,
    pub message_age: f64,
    pub max_age: f64,
    pub hello: f64,
    pub forward_delay: f64,
    pub flags: BpduFlags,
    pub role: PortRole,
    pub version: u8,
    pub vlan: Option<u16>,
}

impl Bpdu {
    pub const DEFAULT_MAX_AGE: f64 = 20.0;
    pub const DEFAULT_HELLO: f64 = 2.0;
    pub const DEFAULT_FORWARD_DELAY: f64 = 15.0;

    pub fn originate(bridge_id: BridgeId, port_id: PortId, vlan: Option<u16>) -> Self {
        Self {
            root_id: bridge_id,
            root_path_cost: 0,
            bridge_id,
            port_id,
            message_age: 0.0,
            max_age: Self::DEFAULT_MAX_AGE,
            hello: Self::DEFAULT_HELLO,
            forward_delay: Self::DEFAULT_FORWARD_DELAY,
            flags: BpduFlags::default(),
            role: PortRole::Designated,
            version: 2,
            vlan,
        }
    }

    /// Discards a BPDU whose `message_age` exceeds `max_age`, per the
    /// specified aging rule.
    pub fn is_stale(&self, now: f64, received_at: f64) -> bool {
        (now - received_at) + self.message_age >= self.max_age
    }

    /// Serializes the priority vector and timers onto the wire so a BPDU
    /// can cross a real `Link` as a `DatalinkMessage` payload, same as any
    /// other protocol's `to_bytes`/`from_bytes` pair in this crate.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(61);
        bytes.extend_from_slice(&self.root_id.priority.to_be_bytes());
        bytes.extend_from_slice(&self.root_id.mac.octets());
        bytes.extend_from_slice(&self.root_path_cost.to_be_bytes());
        bytes.extend_from_slice(&self.bridge_id.priority.to_be_bytes());
        bytes.extend_from_slice(&self.bridge_id.mac.octets());
        bytes.push(self.port_id.priority);
        bytes.extend_from_slice(&self.port_id.number.to_be_bytes());
        bytes.extend_from_slice(&self.message_age.to_be_bytes());
        bytes.extend_from_slice(&self.max_age.to_be_bytes());
        bytes.extend_from_slice(&self.hello.to_be_bytes());
        bytes.extend_from_slice(&self.forward_delay.to_be_bytes());
        let flags = (self.flags.proposal as u8) | ((self.flags.agreement as u8) << 1) | ((self.flags.topology_change as u8) << 2);
        bytes.push(flags);
        bytes.push(role_to_byte(self.role));
        bytes.push(self.version);
        match self.vlan {
            Some(vlan) => {
                bytes.push(1);
                bytes.extend_from_slice(&vlan.to_be_bytes());
            }
            None => {
                bytes.push(0);
                bytes.extend_from_slice(&0u16.to_be_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 61 {
            return None;
        }
        let root_id = BridgeId::new(u16::from_be_bytes(bytes[0..2].try_into().ok()?), MacAddress::new(bytes[2..8].try_into().ok()?));
        let root_path_cost = u32::from_be_bytes(bytes[8..12].try_into().ok()?);
        let bridge_id = BridgeId::new(u16::from_be_bytes(bytes[12..14].try_into().ok()?), MacAddress::new(bytes[14..20].try_into().ok()?));
        let port_id = PortId { priority: bytes[20], number: u16::from_be_bytes(bytes[21..23].try_into().ok()?) };
        let message_age = f64::from_be_bytes(bytes[23..31].try_into().ok()?);
        let max_age = f64::from_be_bytes(bytes[31..39].try_into().ok()?);
        let hello = f64::from_be_bytes(bytes[39..47].try_into().ok()?);
        let forward_delay = f64::from_be_bytes(bytes[47..55].try_into().ok()?);
        let flags = BpduFlags {
            proposal: bytes[55] & 0b001 != 0,
            agreement: bytes[55] & 0b010 != 0,
            topology_change: bytes[55] & 0b100 != 0,
        };
        let role = role_from_byte(bytes[56])?;
        let version = bytes[57];
        let vlan = if bytes[58] == 1 { Some(u16::from_be_bytes(bytes[59..61].try_into().ok()?)) } else { None };
        Some(Self { root_id, root_path_cost, bridge_id, port_id, message_age, max_age, hello, forward_delay, flags, role, version, vlan })
    }

    pub fn relay(&self, bridge_id: BridgeId, port_id: PortId, added_cost: u32) -> Self {
        Self {
            root_id: self.root_id,
            root_path_cost: self.root_path_cost + added_cost,
            bridge_id,
            port_id,
            message_age: self.message_age + 1.0,
            max_age: self.max_age,
            hello: self.hello,
            forward_delay: self.forward_delay,
            flags: BpduFlags::default(),
            role: PortRole::Designated,
            version: self.version,
            vlan: self.vlan,
        }
    }
}

/// BPDU priority vector ordering per §4.9: root id, then root path cost,
/// then sender bridge id, then sender port id — lower wins at each step.
pub fn is_better(candidate: &Bpdu, current: &Bpdu) -> bool {
    (candidate.root_id, candidate.root_path_cost, candidate.bridge_id, port_key(candidate.port_id))
        < (current.root_id, current.root_path_cost, current.bridge_id, port_key(current.port_id))
}

fn port_key(port_id: PortId) -> (u8, u16) {
    (port_id.priority, port_id.number)
}

fn role_to_byte(role: PortRole) -> u8 {
    match role {
        PortRole::Root => 0,
        PortRole::Designated => 1,
        PortRole::Alternate => 2,
        PortRole::Backup => 3,
        PortRole::Disabled => 4,
    }
}

fn role_from_byte(byte: u8) -> Option<PortRole> {
    match byte {
        0 => Some(PortRole::Root),
        1 => Some(PortRole::Designated),
        2 => Some(PortRole::Alternate),
        3 => Some(PortRole::Backup),
        4 => Some(PortRole::Disabled),
        _ => None,
    }
}

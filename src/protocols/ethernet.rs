//! Ethernet / 802.1Q framing and MAC learning for switches. Grounded on
//! the pack's `ddf622c9_AndrewOzarko-capsule` `core/src/packets/ethernet.rs`
//! for frame field layout and `9674c348_binator-network` `ether_type.rs`
//! for the EtherType discrimination style.

use std::collections::HashMap;

use crate::addresses::MacAddress;
use crate::hardware_interface::HardwareInterface;
use crate::listener::Outcome;
use crate::messages::DatalinkMessage;

/// Outcome of switching a frame: either forward out a specific egress
/// port (unicast, known MAC) or flood out every port in the VLAN but the
/// ingress one (broadcast/multicast/unknown unicast).
pub enum SwitchDecision {
    ForwardTo(usize),
    Flood,
    Drop,
}

const MAC_AGE_SECONDS: f64 = 300.0;

struct MacTableEntry {
    port: usize,
    last_seen: f64,
}

/// A switch-wide MAC-learning table, keyed by `(vlan, mac)` so the same
/// address learned on two VLANs forwards independently per §4.5. Owned
/// once per [`crate::node::Switch`], not per port: a frame's source MAC
/// must be visible to every port's lookup, not just the ingress port that
/// happened to learn it.
#[derive(Default)]
pub struct MacTable {
    entries: HashMap<(u16, MacAddress), MacTableEntry>,
}

impl MacTable {
    pub fn learn(&mut self, vlan: u16, mac: MacAddress, port: usize, now: f64) {
        self.entries.insert((vlan, mac), MacTableEntry { port, last_seen: now });
    }

    pub fn lookup(&self, vlan: u16, mac: &MacAddress) -> Option<usize> {
        self.entries.get(&(vlan, *mac)).map(|e| e.port)
    }

    /// Evicts entries idle for more than `max_age` virtual seconds.
    pub fn age_out(&mut self, now: f64, max_age: f64) {
        self.entries.retain(|_, entry| now - entry.last_seen <= max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Learns `(vlan, src_mac, ingress_port)` into the switch's shared table
/// and decides where a unicast frame should go, per §4.5. Flooding/
/// forwarding to STP-blocked ports is the caller's responsibility (it
/// consults per-port STP state, §4.9).
pub fn learn_and_decide(table: &mut MacTable, frame: &DatalinkMessage, vlan: u16, ingress_port: usize, now: f64) -> SwitchDecision {
    table.learn(vlan, frame.mac_src(), ingress_port, now);

    if frame.mac_dst().is_broadcast() || frame.mac_dst().is_multicast() {
        return SwitchDecision::Flood;
    }

    match table.lookup(vlan, &frame.mac_dst()) {
        Some(port) => SwitchDecision::ForwardTo(port),
        None => SwitchDecision::Flood,
    }
}

pub fn age_mac_table(table: &mut MacTable, now: f64) {
    table.age_out(now, MAC_AGE_SECONDS);
}

/// Ingress handling: resolves the frame's VLAN per the port's mode,
/// returning `Stop` for frames that must be dropped (tagged-on-access).
pub fn ingress_vlan_outcome(iface: &HardwareInterface, frame: &DatalinkMessage) -> (Outcome, Option<u16>) {
    match iface.resolve_ingress_vlan(frame) {
        Ok(vlan) => (Outcome::Continue, Some(vlan)),
        Err(_) => (Outcome::Stop, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::EtherType;

    fn frame(dst: MacAddress) -> DatalinkMessage {
        DatalinkMessage::builder()
            .mac_src(MacAddress::new([1; 6]))
            .mac_dst(dst)
            .ethertype(EtherType::Ipv4)
            .payload(vec![0u8; 46])
            .build()
            .unwrap()
    }

    #[test]
    fn broadcast_always_floods() {
        let mut table = MacTable::default();
        let decision = learn_and_decide(&mut table, &frame(MacAddress::BROADCAST), 1, 0, 0.0);
        assert!(matches!(decision, SwitchDecision::Flood));
    }

    #[test]
    fn known_unicast_forwards_to_learned_port() {
        let mut table = MacTable::default();
        let known = MacAddress::new([2; 6]);
        table.learn(1, known, 2, 0.0);
        let decision = learn_and_decide(&mut table, &frame(known), 1, 0, 1.0);
        match decision {
            SwitchDecision::ForwardTo(port) => assert_eq!(port, 2),
            _ => panic!("expected forward"),
        }
    }

    #[test]
    fn unknown_unicast_floods() {
        let mut table = MacTable::default();
        let decision = learn_and_decide(&mut table, &frame(MacAddress::new([3; 6])), 1, 0, 0.0);
        assert!(matches!(decision, SwitchDecision::Flood));
    }

    #[test]
    fn mac_table_ages_out() {
        let mut table = MacTable::default();
        table.learn(1, MacAddress::new([0; 6]), 1, 0.0);
        table.age_out(400.0, 300.0);
        assert!(table.is_empty());
    }

    #[test]
    fn same_mac_on_different_vlans_learns_independently() {
        let mut table = MacTable::default();
        let mac = MacAddress::new([4; 6]);
        table.learn(1, mac, 0, 0.0);
        table.learn(2, mac, 5, 0.0);
        assert_eq!(table.lookup(1, &mac), Some(0));
        assert_eq!(table.lookup(2, &mac), Some(5));
    }
}

//! Switch: a set of hardware ports, a single switch-wide MAC learning
//! table, 802.1Q VLAN handling per port, and a PVST instance deciding
//! which ports may forward/learn for each VLAN. Grounded on §4.5/§4.9 and
//! `protocols::ethernet`/`protocols::stp::pvst`.

use crate::hardware_interface::HardwareInterface;
use crate::ids::InterfaceId;
use crate::messages::DatalinkMessage;
use crate::protocols::ethernet::{self, MacTable, SwitchDecision};
use crate::protocols::stp::bpdu::BridgeId;
use crate::protocols::stp::pvst::PerVlanSpanningTree;

pub enum SwitchOutput {
    ForwardTo(usize, DatalinkMessage),
    Flood(Vec<(usize, DatalinkMessage)>),
    Drop,
}

pub struct Switch {
    pub name: String,
    pub ports: Vec<HardwareInterface>,
    pub stp: PerVlanSpanningTree,
    mac_table: MacTable,
}

fn iface_id(port: usize) -> InterfaceId {
    InterfaceId(port as u64)
}

impl Switch {
    pub fn new(name: impl Into<String>, ports: Vec<HardwareInterface>, bridge_priority: u16, rapid: bool) -> Self {
        let bridge_mac = ports.first().map(|p| p.mac()).unwrap_or(crate::addresses::MacAddress::new([0; 6]));
        let stp = PerVlanSpanningTree::new(BridgeId::new(bridge_priority, bridge_mac), rapid);
        Self { name: name.into(), ports, stp, mac_table: MacTable::default() }
    }

    /// Registers every port into VLAN 1's spanning tree instance with the
    /// given path cost, the common default for an unconfigured switch.
    pub fn wire_default_vlan(&mut self, cost: u32) {
        for idx in 0..self.ports.len() {
            self.stp.add_port(1, iface_id(idx), cost);
        }
    }

    fn port_forwards(&self, port: usize, vlan: u16) -> bool {
        self.stp.forwards(vlan, iface_id(port))
    }

    fn port_learns(&self, port: usize, vlan: u16) -> bool {
        self.stp.state(vlan, iface_id(port)).map(|s| s.learns()).unwrap_or(true)
    }

    /// Processes one inbound frame on `port`. Returns where (if anywhere)
    /// it should be re-emitted, with each egress frame individually
    /// 802.1Q-tagged per that port's mode.
    pub fn ingress(&mut self, port: usize, frame: DatalinkMessage, now: f64) -> SwitchOutput {
        let vlan = match self.ports[port].resolve_ingress_vlan(&frame) {
            Ok(vlan) => vlan,
            Err(_) => return SwitchOutput::Drop,
        };
        if !self.port_learns(port, vlan) {
            return SwitchOutput::Drop;
        }

        let tagged = frame.with_vlan(Some(vlan));
        let decision = ethernet::learn_and_decide(&mut self.mac_table, &tagged, vlan, port, now);

        match decision {
            SwitchDecision::Drop => SwitchOutput::Drop,
            SwitchDecision::ForwardTo(egress) => {
                if egress == port || !self.port_forwards(egress, vlan) {
                    return SwitchOutput::Drop;
                }
                let out = tagged.with_vlan(self.ports[egress].egress_vlan_tag(vlan));
                SwitchOutput::ForwardTo(egress, out)
            }
            SwitchDecision::Flood => {
                let mut frames = Vec::new();
                for egress in 0..self.ports.len() {
                    if egress == port || !self.port_forwards(egress, vlan) {
                        continue;
                    }
                    let out_vlan = self.ports[egress].egress_vlan_tag(vlan);
                    frames.push((egress, tagged.with_vlan(out_vlan)));
                }
                SwitchOutput::Flood(frames)
            }
        }
    }

    pub fn age_mac_tables(&mut self, now: f64) {
        ethernet::age_mac_table(&mut self.mac_table, now);
    }

    pub fn tick_stp(&mut self, now: f64) {
        self.stp.tick(now);
    }

    /// Every `(port, vlan, bpdu)` this switch would currently transmit as
    /// a hello, one per VLAN instance each port participates in.
    pub fn originate_hellos(&self) -> Vec<(usize, u16, crate::protocols::stp::bpdu::Bpdu)> {
        let mut out = Vec::new();
        for vlan in self.stp.vlans() {
            for iface in self.stp.ports(vlan) {
                if let Some(bpdu) = self.stp.originate_bpdu(vlan, iface) {
                    out.push((iface.0 as usize, vlan, bpdu));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::MacAddress;
    use crate::messages::EtherType;

    fn switch(n: usize) -> Switch {
        let ports = (0..n).map(|i| HardwareInterface::new(format!("Gi0/{i}"), MacAddress::new([i as u8; 6]))).collect();
        let mut s = Switch::new("sw1", ports, 32768, false);
        s.wire_default_vlan(4);
        s.stp.recompute(1, 0.0);
        s.stp.tick(30.0);
        s
    }

    fn frame(dst: MacAddress) -> DatalinkMessage {
        DatalinkMessage::builder()
            .mac_src(MacAddress::new([9; 6]))
            .mac_dst(dst)
            .ethertype(EtherType::Ipv4)
            .payload(vec![0u8; 46])
            .build()
            .unwrap()
    }

    #[test]
    fn broadcast_floods_to_every_other_forwarding_port() {
        let mut s = switch(3);
        match s.ingress(0, frame(MacAddress::BROADCAST), 0.0) {
            SwitchOutput::Flood(frames) => {
                let targets: Vec<usize> = frames.iter().map(|(p, _)| *p).collect();
                assert_eq!(targets, vec![1, 2]);
            }
            _ => panic!("expected flood"),
        }
    }

    #[test]
    fn unicast_to_known_mac_forwards_to_one_port() {
        let mut s = switch(3);
        let known = MacAddress::new([7; 6]);
        let learn_frame = DatalinkMessage::builder()
            .mac_src(known)
            .mac_dst(MacAddress::BROADCAST)
            .ethertype(EtherType::Ipv4)
            .payload(vec![0u8; 46])
            .build()
            .unwrap();
        s.ingress(1, learn_frame, 0.0);
        match s.ingress(0, frame(known), 1.0) {
            SwitchOutput::ForwardTo(port, _) => assert_eq!(port, 1),
            _ => panic!("expected forward"),
        }
    }
}

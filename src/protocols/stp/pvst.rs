//! Per-VLAN Spanning Tree: one independent [`StpInstance`] per VLAN,
//! so a trunk can forward on different ports for different VLANs.
//! Grounded on §4.9's PVST/R-PVST requirement; layered on top of the
//! single-instance election in `super`.

use std::collections::HashMap;

use crate::ids::InterfaceId;

use super::bpdu::{BridgeId, PortRole};
use super::port::PortState;
use super::StpInstance;

pub struct PerVlanSpanningTree {
    bridge_id: BridgeId,
    rapid: bool,
    instances: HashMap<u16, StpInstance>,
}

impl PerVlanSpanningTree {
    pub fn new(bridge_id: BridgeId, rapid: bool) -> Self {
        Self { bridge_id, rapid, instances: HashMap::new() }
    }

    /// Lazily creates the instance for `vlan` on first reference.
    fn instance_mut(&mut self, vlan: u16) -> &mut StpInstance {
        self.instances.entry(vlan).or_insert_with(|| StpInstance::new(self.bridge_id, self.rapid, Some(vlan)))
    }

    pub fn add_port(&mut self, vlan: u16, interface: InterfaceId, cost: u32) {
        self.instance_mut(vlan).add_port(interface, cost);
    }

    /// Re-runs root/designated election for `vlan`'s instance. Callers
    /// trigger this on topology change or BPDU arrival; a freshly wired
    /// switch with no peers yet needs one call to leave every port in
    /// Blocking-forever limbo and become its own root.
    pub fn recompute(&mut self, vlan: u16, now: f64) {
        self.instance_mut(vlan).recompute(now);
    }

    pub fn receive_bpdu(&mut self, vlan: u16, interface: InterfaceId, bpdu: super::bpdu::Bpdu, now: f64) {
        self.instance_mut(vlan).receive_bpdu(interface, bpdu, now);
    }

    /// The BPDU `vlan`'s instance would transmit out `interface`, for the
    /// periodic hello job to pick up and put on the wire.
    pub fn originate_bpdu(&self, vlan: u16, interface: InterfaceId) -> Option<super::bpdu::Bpdu> {
        self.instances.get(&vlan)?.originate_bpdu(interface)
    }

    /// Every interface registered under `vlan`'s instance.
    pub fn ports(&self, vlan: u16) -> Vec<InterfaceId> {
        self.instances.get(&vlan).map(|i| i.interfaces().collect()).unwrap_or_default()
    }

    pub fn tick(&mut self, now: f64) {
        for instance in self.instances.values_mut() {
            instance.tick(now);
        }
    }

    pub fn role(&self, vlan: u16, interface: InterfaceId) -> Option<PortRole> {
        self.instances.get(&vlan)?.role(interface)
    }

    pub fn state(&self, vlan: u16, interface: InterfaceId) -> Option<PortState> {
        self.instances.get(&vlan)?.state(interface)
    }

    /// A port forwards traffic for `vlan` only if that VLAN's instance
    /// has put it in the Forwarding state — a trunk port can be
    /// Forwarding for VLAN 10 while Blocking for VLAN 20.
    pub fn forwards(&self, vlan: u16, interface: InterfaceId) -> bool {
        self.state(vlan, interface).map(|s| s.forwards()).unwrap_or(false)
    }

    pub fn vlans(&self) -> impl Iterator<Item = u16> + '_ {
        self.instances.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::MacAddress;
    use crate::ids::InterfaceId;

    #[test]
    fn each_vlan_elects_independently() {
        let bridge_id = BridgeId::new(100, MacAddress::new([0; 6]));
        let mut pvst = PerVlanSpanningTree::new(bridge_id, false);
        let port = InterfaceId(0);
        pvst.add_port(10, port, 4);
        pvst.add_port(20, port, 4);
        pvst.tick(0.0);

        pvst.instances.get_mut(&10).unwrap().recompute(0.0);
        pvst.instances.get_mut(&20).unwrap().recompute(0.0);

        assert_eq!(pvst.role(10, port), Some(PortRole::Designated));
        assert_eq!(pvst.role(20, port), Some(PortRole::Designated));
    }

    #[test]
    fn forwarding_is_independent_per_vlan() {
        let bridge_id = BridgeId::new(100, MacAddress::new([0; 6]));
        let mut pvst = PerVlanSpanningTree::new(bridge_id, false);
        let port = InterfaceId(0);
        pvst.add_port(10, port, 4);
        pvst.instances.get_mut(&10).unwrap().recompute(0.0);
        pvst.tick(30.0);
        assert!(pvst.forwards(10, port));
        assert!(!pvst.forwards(20, port));
    }
}

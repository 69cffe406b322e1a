//! Spanning Tree: bridge/root election, port role/state assignment, and
//! the per-VLAN PVST instancing layer. Grounded on §4.9; the repeating
//! hello-timer origination follows the same `Rc<RefCell<Self>>` + `Weak`
//! self-scheduling pattern as `protocols::arp::ArpTable::start_aging`.

pub mod bpdu;
pub mod port;
pub mod pvst;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::ids::InterfaceId;
use crate::scheduler::{CancelHandle, Scheduler};

use bpdu::{is_better, Bpdu, BridgeId, PortId, PortRole};
use port::{PortEntry, PortState};

/// RSTP edge-port auto-detect window: a port that has received no BPDU
/// this long after coming up is assumed to have no bridge on the other
/// end and becomes an edge port, per §4.9's RSTP additions.
const EDGE_AUTODETECT_SECONDS: f64 = 3.0;

struct PortSlot {
    entry: PortEntry,
    received: Option<(Bpdu, f64)>,
    port_id: PortId,
}

pub struct StpInstance {
    pub bridge_id: BridgeId,
    pub rapid: bool,
    pub vlan: Option<u16>,
    pub root_id: BridgeId,
    pub root_path_cost: u32,
    pub root_port: Option<InterfaceId>,
    ports: HashMap<InterfaceId, PortSlot>,
    hello_handle: Option<CancelHandle>,
    next_port_number: u16,
}

impl StpInstance {
    pub fn new(bridge_id: BridgeId, rapid: bool, vlan: Option<u16>) -> Self {
        Self {
            bridge_id,
            rapid,
            vlan,
            root_id: bridge_id,
            root_path_cost: 0,
            root_port: None,
            ports: HashMap::new(),
            hello_handle: None,
            next_port_number: 1,
        }
    }

    pub fn add_port(&mut self, interface: InterfaceId, cost: u32) {
        let port_id = PortId { priority: 128, number: self.next_port_number };
        self.next_port_number += 1;
        self.ports.insert(interface, PortSlot { entry: PortEntry::new(cost), received: None, port_id });
    }

    pub fn is_root_bridge(&self) -> bool {
        self.root_id == self.bridge_id
    }

    pub fn role(&self, interface: InterfaceId) -> Option<PortRole> {
        self.ports.get(&interface).map(|slot| slot.entry.role)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = InterfaceId> + '_ {
        self.ports.keys().copied()
    }

    pub fn state(&self, interface: InterfaceId) -> Option<PortState> {
        self.ports.get(&interface).map(|slot| slot.entry.state)
    }

    pub fn set_edge(&mut self, interface: InterfaceId, edge: bool, now: f64) {
        let rapid = self.rapid;
        if let Some(slot) = self.ports.get_mut(&interface) {
            if edge {
                slot.entry.mark_edge(now);
            } else {
                slot.entry.edge = false;
                slot.entry.rapid = rapid;
            }
        }
    }

    /// The BPDU this bridge would transmit out `interface` given the
    /// current root/cost state.
    pub fn originate_bpdu(&self, interface: InterfaceId) -> Option<Bpdu> {
        let slot = self.ports.get(&interface)?;
        let mut bpdu = Bpdu::originate(self.bridge_id, slot.port_id, self.vlan);
        bpdu.root_id = self.root_id;
        bpdu.root_path_cost = self.root_path_cost;
        bpdu.flags.agreement = self.rapid && matches!(slot.entry.role, PortRole::Root | PortRole::Designated);
        Some(bpdu)
    }

    /// Records an inbound BPDU and recomputes roles. Stale BPDUs (per
    /// the `message_age >= max_age` rule) are discarded without effect.
    pub fn receive_bpdu(&mut self, interface: InterfaceId, bpdu: Bpdu, now: f64) {
        if bpdu.is_stale(now, now) {
            return;
        }
        if let Some(slot) = self.ports.get_mut(&interface) {
            slot.received = Some((bpdu, now));
        }
        self.recompute(now);
    }

    /// Root/designated election: each port's candidate vector is its
    /// received BPDU with this port's cost added to root_path_cost; the
    /// globally best vector (including our own, self-rooted vector)
    /// determines the root bridge and root port. Every other port is
    /// Designated if our vector beats what it last heard, else
    /// Alternate/Backup.
    pub fn recompute(&mut self, now: f64) {
        let self_vector = Bpdu::originate(self.bridge_id, PortId { priority: 128, number: 0 }, self.vlan);

        let mut best: (Bpdu, Option<InterfaceId>) = (self_vector, None);
        for (&interface, slot) in self.ports.iter() {
            let Some((received, _)) = &slot.received else { continue };
            let candidate = received.relay(self.bridge_id, slot.port_id, slot.entry.cost);
            if is_better(&candidate, &best.0) {
                best = (candidate, Some(interface));
            }
        }

        self.root_id = best.0.root_id;
        self.root_path_cost = best.0.root_path_cost;
        self.root_port = best.1;

        let own_designated_vector = Bpdu { root_id: self.root_id, root_path_cost: self.root_path_cost, bridge_id: self.bridge_id, ..self_vector };

        for (&interface, slot) in self.ports.iter_mut() {
            if Some(interface) == self.root_port {
                slot.entry.set_role(PortRole::Root, now);
                continue;
            }
            let challenger = slot.received.as_ref().map(|(bpdu, _)| *bpdu);
            let we_win = match challenger {
                Some(bpdu) => is_better(&own_designated_vector, &bpdu) || own_designated_vector.bridge_id == bpdu.bridge_id,
                None => true,
            };
            if we_win {
                slot.entry.set_role(PortRole::Designated, now);
            } else {
                slot.entry.set_role(PortRole::Alternate, now);
            }
        }
    }

    /// Advances forward-delay transitions, ages out BPDUs no neighbor
    /// has refreshed in `max_age` seconds (promoting the port's role at
    /// the next `recompute`), and auto-detects RSTP edge ports that have
    /// gone `EDGE_AUTODETECT_SECONDS` since coming up without hearing one.
    pub fn tick(&mut self, now: f64) {
        let rapid = self.rapid;
        let mut needs_recompute = false;

        for slot in self.ports.values_mut() {
            slot.entry.tick_forward_delay(now, Bpdu::DEFAULT_FORWARD_DELAY);

            if let Some((bpdu, received_at)) = &slot.received {
                if bpdu.is_stale(now, *received_at) {
                    slot.received = None;
                    needs_recompute = true;
                }
            }

            if rapid && !slot.entry.edge {
                match slot.entry.up_since {
                    None => slot.entry.up_since = Some(now),
                    Some(up_since) if slot.received.is_none() && now - up_since >= EDGE_AUTODETECT_SECONDS => {
                        slot.entry.mark_edge(now);
                        needs_recompute = true;
                    }
                    _ => {}
                }
            }
        }

        if needs_recompute {
            self.recompute(now);
        }
    }

    /// Starts the repeating hello-timer origination job. `emit` is
    /// called with (interface, bpdu) for every port on every hello
    /// interval; the caller is responsible for actually transmitting it
    /// on the link.
    pub fn start_hello_timer(instance: &Rc<RefCell<Self>>, scheduler: &Scheduler, mut emit: impl FnMut(InterfaceId, Bpdu) + 'static) {
        let weak: Weak<RefCell<Self>> = Rc::downgrade(instance);
        let handle = scheduler.repeat(Bpdu::DEFAULT_HELLO, move || {
            let Some(strong) = weak.upgrade() else { return };
            let inner = strong.borrow();
            let interfaces: Vec<InterfaceId> = inner.ports.keys().copied().collect();
            drop(inner);
            for interface in interfaces {
                if let Some(bpdu) = strong.borrow().originate_bpdu(interface) {
                    emit(interface, bpdu);
                }
            }
        });
        instance.borrow_mut().hello_handle = Some(handle);
    }
}

//! The topology aggregate: arenas of nodes and links keyed by the
//! handles in `ids`, plus the wiring needed to actually move a frame
//! from one interface to another through the scheduler. Grounded on
//! the Design Notes' arena recommendation (avoids the `Rc<RefCell<_>>`
//! cycles a node-owns-its-neighbor model would need) and the teacher's
//! `core::pfe` service-composition style for per-kind dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use nohash_hasher::IntMap;

use crate::addresses::IPv4Address;
use crate::errors::SimError;
use crate::hardware_interface::HardwareInterface;
use crate::ids::{InterfaceId, LinkId, NodeId};
use crate::link::{Link, LinkEvent};
use crate::listener::{ListenerId, Outcome};
use crate::messages::{DatalinkMessage, EtherType};
use crate::node::{Host, Node, Router, Switch};
use crate::protocols::arp::{ArpAction, ArpPacket};
use crate::protocols::ipv4;
use crate::protocols::stp::bpdu::Bpdu;
use crate::scheduler::{Scheduler, SchedulerConfig};

/// Where a physical interface lives: which node owns it, and that
/// node's local index for it (an entry in `Host`/`Router`'s
/// `interfaces`, or `Switch`'s `ports`).
#[derive(Clone, Copy)]
struct InterfaceOwner {
    node: NodeId,
    local_index: usize,
}

pub struct Network {
    pub scheduler: Scheduler,
    nodes: IntMap<NodeId, Node>,
    links: IntMap<LinkId, Link>,
    interface_owner: IntMap<InterfaceId, InterfaceOwner>,
    link_of_interface: IntMap<InterfaceId, LinkId>,
    next_node_id: u64,
    next_interface_id: u64,
    next_link_id: u64,
}

impl Network {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config),
            nodes: IntMap::default(),
            links: IntMap::default(),
            interface_owner: IntMap::default(),
            link_of_interface: IntMap::default(),
            next_node_id: 0,
            next_interface_id: 0,
            next_link_id: 0,
        }
    }

    fn alloc_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Mints a fresh `InterfaceId` for the node's `local_index`-th
    /// interface/port and records the owning mapping. Called once per
    /// interface after the node itself has been inserted.
    pub fn register_interface(&mut self, node: NodeId, local_index: usize) -> InterfaceId {
        let id = InterfaceId(self.next_interface_id);
        self.next_interface_id += 1;
        self.interface_owner.insert(id, InterfaceOwner { node, local_index });
        id
    }

    pub fn add_host(&mut self, host: Host) -> (NodeId, Vec<InterfaceId>) {
        let id = self.alloc_node_id();
        let count = host.interfaces.len();
        self.nodes.insert(id, Node::Host(host));
        let ids = (0..count).map(|i| self.register_interface(id, i)).collect();
        (id, ids)
    }

    pub fn add_router(&mut self, router: Router) -> (NodeId, Vec<InterfaceId>) {
        let id = self.alloc_node_id();
        let count = router.interfaces.len();
        self.nodes.insert(id, Node::Router(router));
        let ids = (0..count).map(|i| self.register_interface(id, i)).collect();
        (id, ids)
    }

    pub fn add_switch(&mut self, switch: Switch) -> (NodeId, Vec<InterfaceId>) {
        let id = self.alloc_node_id();
        let count = switch.ports.len();
        self.nodes.insert(id, Node::Switch(switch));
        let ids = (0..count).map(|i| self.register_interface(id, i)).collect();
        (id, ids)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn add_link(&mut self, a: InterfaceId, b: InterfaceId, length_m: f64) -> LinkId {
        let id = LinkId(self.next_link_id);
        self.next_link_id += 1;
        self.links.insert(id, Link::new(a, b, length_m));
        self.link_of_interface.insert(a, id);
        self.link_of_interface.insert(b, id);
        id
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Registers a packet-capture tap on the link carrying `interface`,
    /// per §6's `LinkLayerSpy`.
    pub fn add_tap(&mut self, interface: InterfaceId, spy: impl FnMut(&LinkEvent) -> Outcome + 'static) -> Option<ListenerId> {
        let link_id = *self.link_of_interface.get(&interface)?;
        Some(self.links.get_mut(&link_id)?.add_spy(spy))
    }

    fn hardware_of(&self, interface: InterfaceId) -> Option<&HardwareInterface> {
        let owner = self.interface_owner.get(&interface)?;
        match self.nodes.get(&owner.node)? {
            Node::Host(h) => Some(h.interfaces[owner.local_index].hardware()),
            Node::Router(r) => Some(r.interfaces[owner.local_index].hardware()),
            Node::Switch(s) => Some(&s.ports[owner.local_index]),
        }
    }

    /// Hands a built frame to the link attached to `interface` for
    /// delivery. `network` is the shared handle the delivery callback
    /// re-enters once the frame arrives, following the same
    /// `Rc<RefCell<Self>>` self-scheduling idiom as
    /// `protocols::arp::ArpTable::start_aging`.
    pub fn transmit(network: &Rc<RefCell<Network>>, interface: InterfaceId, frame: DatalinkMessage) -> Result<(), SimError> {
        let (link_id, speed, duplex) = {
            let net = network.borrow();
            let link_id = *net.link_of_interface.get(&interface).ok_or(SimError::LinkNotConnected)?;
            let hw = net.hardware_of(interface);
            let speed = hw.map(|h| h.current_speed()).unwrap_or(1000);
            let duplex = hw.map(|h| h.duplex()).unwrap_or(crate::hardware_interface::Duplex::Full);
            (link_id, speed, duplex)
        };
        let weak = Rc::downgrade(network);
        let scheduler = network.borrow().scheduler.clone();
        let mut net = network.borrow_mut();
        let link = net.links.get_mut(&link_id).ok_or(SimError::LinkNotConnected)?;
        link.send(&scheduler, interface, frame, speed, duplex, move |_src, dst, message| {
            if let Some(network) = weak.upgrade() {
                Network::receive(&network, dst, message);
            }
        })
    }

    /// Entry point for a frame that has just finished propagation: marks
    /// it received on the link (for spies) and dispatches to the owning
    /// node.
    pub fn receive(network: &Rc<RefCell<Network>>, interface: InterfaceId, frame: DatalinkMessage) {
        let owner = {
            let mut net = network.borrow_mut();
            if let Some(link_id) = net.link_of_interface.get(&interface).copied() {
                if let Some(link) = net.links.get_mut(&link_id) {
                    link.notify_receive(&frame, interface, interface);
                }
            }
            net.interface_owner.get(&interface).copied()
        };
        let Some(owner) = owner else { return };
        let now = network.borrow().scheduler.delta_time();

        let mut net = network.borrow_mut();
        match net.nodes.get_mut(&owner.node) {
            Some(Node::Switch(switch)) => {
                // BPDUs terminate at the switch that receives them — they
                // never enter the learn/flood data path, unlike every
                // other frame a switch forwards.
                if frame.ethertype() == EtherType::Stp {
                    if let Some(bpdu) = decode_bpdu(frame.payload()) {
                        switch.stp.receive_bpdu(frame.vlan().unwrap_or(1), InterfaceId(owner.local_index as u64), bpdu, now);
                    }
                    return;
                }
                let output = switch.ingress(owner.local_index, frame, now);
                drop(net);
                Network::dispatch_switch_output(network, owner.node, output);
            }
            Some(Node::Host(_)) | Some(Node::Router(_)) => {
                drop(net);
                Network::handle_network_layer(network, owner, frame);
            }
            None => {}
        }
    }

    fn dispatch_switch_output(network: &Rc<RefCell<Network>>, switch_node: NodeId, output: crate::node::switch::SwitchOutput) {
        use crate::node::switch::SwitchOutput;
        let egress_interfaces: Vec<(usize, DatalinkMessage)> = match output {
            SwitchOutput::ForwardTo(port, frame) => vec![(port, frame)],
            SwitchOutput::Flood(frames) => frames,
            SwitchOutput::Drop => Vec::new(),
        };
        for (local_index, frame) in egress_interfaces {
            let interface = {
                let net = network.borrow();
                net.interface_owner.iter().find(|(_, o)| o.node == switch_node && o.local_index == local_index).map(|(id, _)| *id)
            };
            if let Some(interface) = interface {
                let _ = Network::transmit(network, interface, frame);
            }
        }
    }

    /// IPv4/ARP handling for a host or router interface: resolves VLAN,
    /// unwraps the datalink payload, and either answers ARP, reassembles
    /// and consumes an addressed-to-us datagram, or forwards a routed
    /// one (routers only). Hosts/routers don't run spanning tree, so an
    /// `Stp`-tagged frame arriving here (it shouldn't) is simply dropped.
    fn handle_network_layer(network: &Rc<RefCell<Network>>, owner: InterfaceOwner, frame: DatalinkMessage) {
        match frame.ethertype() {
            EtherType::Arp => Network::handle_arp(network, owner, &frame),
            EtherType::Ipv4 => Network::handle_ipv4(network, owner, &frame),
            EtherType::Stp => {}
        }
    }

    fn handle_arp(network: &Rc<RefCell<Network>>, owner: InterfaceOwner, frame: &DatalinkMessage) {
        let Some(packet) = ArpPacket::from_bytes(frame.payload()) else { return };
        let now = network.borrow().scheduler.delta_time();
        let mut net = network.borrow_mut();
        let (our_mac, our_ip, arp) = match net.nodes.get(&owner.node) {
            Some(Node::Host(h)) => (h.interfaces[owner.local_index].hardware().mac(), h.interfaces[owner.local_index].primary_address(), h.arp.clone()),
            Some(Node::Router(r)) => (r.interfaces[owner.local_index].hardware().mac(), r.interfaces[owner.local_index].primary_address(), r.arp.clone()),
            _ => return,
        };
        match packet.operation {
            crate::protocols::arp::ArpOperation::Request => {
                if Some(packet.target_ip) != our_ip {
                    return;
                }
                let reply = packet.reply_to(our_mac, packet.target_ip);
                let datalink = DatalinkMessage::builder()
                    .mac_src(our_mac)
                    .mac_dst(packet.sender_mac)
                    .ethertype(EtherType::Arp)
                    .payload(reply.to_bytes())
                    .build();
                drop(net);
                if let Ok(datalink) = datalink {
                    let interface = Network::interface_for(network, owner);
                    if let Some(interface) = interface {
                        let _ = Network::transmit(network, interface, datalink);
                    }
                }
            }
            crate::protocols::arp::ArpOperation::Reply => {
                let drained = arp.borrow_mut().resolve(packet.sender_ip, packet.sender_mac, now);
                drop(net);
                for queued in drained {
                    let datalink = DatalinkMessage::builder()
                        .mac_src(our_mac)
                        .mac_dst(packet.sender_mac)
                        .ethertype(EtherType::Ipv4)
                        .payload(queued)
                        .build();
                    if let (Ok(datalink), Some(interface)) = (datalink, Network::interface_for(network, owner)) {
                        let _ = Network::transmit(network, interface, datalink);
                    }
                }
            }
        }
    }

    fn handle_ipv4(network: &Rc<RefCell<Network>>, owner: InterfaceOwner, frame: &DatalinkMessage) {
        let Ok(fragment) = ipv4::from_bytes(frame.payload()) else { return };
        let now = network.borrow().scheduler.delta_time();
        let mut net = network.borrow_mut();
        match net.nodes.get_mut(&owner.node) {
            Some(Node::Host(host)) => {
                if !host.has_address(&fragment.dst()) {
                    return;
                }
                let key = ipv4::ReassemblyKey {
                    ingress_iface: InterfaceId(owner.local_index as u64),
                    net_src: fragment.src(),
                    identification: fragment.identification(),
                };
                let Some(datagram) = host.reassembly.accept(key, fragment, now) else { return };
                let reply = host.handle_inbound(&datagram);
                drop(net);
                if let Some(reply) = reply {
                    Network::send_ipv4(network, owner.node, owner.local_index, reply);
                }
            }
            Some(Node::Router(router)) => {
                // Datagrams addressed to the router itself (e.g. a ping
                // targeting an interface IP) are dropped rather than
                // answered; `Router` has no ICMP responder of its own.
                if router.has_address(&fragment.dst()) {
                    return;
                }
                // Each fragment is forwarded independently, just like a
                // real router — reassembly happens only at the end host.
                match router.forward(&fragment) {
                    Ok((egress, next_hop, forwarded)) => {
                        drop(net);
                        Network::route_and_send(network, owner.node, egress, next_hop, forwarded);
                    }
                    Err(_) => {}
                }
            }
            _ => {}
        }
    }

    /// Sends a locally-originated or locally-replied IPv4 datagram from
    /// `node`. For a host, consults [`Host::route_for`] so an off-link
    /// destination goes out via the default gateway rather than being
    /// handed to ARP directly; anything else (a router relaying its own
    /// reply) keeps the caller's interface and destination as given.
    pub fn send_ipv4(network: &Rc<RefCell<Network>>, node: NodeId, local_index: usize, datagram: crate::messages::IPv4Message) {
        let (egress, next_hop) = {
            let net = network.borrow();
            match net.nodes.get(&node) {
                Some(Node::Host(h)) => h.route_for(datagram.dst()).unwrap_or((local_index, datagram.dst())),
                _ => (local_index, datagram.dst()),
            }
        };
        Network::route_and_send(network, node, egress, next_hop, datagram);
    }

    /// Fragments `datagram` to the egress interface's `max_fragment_size`
    /// (per §4.7) and resolves/sends each resulting fragment through ARP.
    /// A single unresolved next hop only ever triggers one ARP broadcast
    /// for the whole datagram, even though every fragment independently
    /// calls [`ArpTable::enqueue_request`] to get queued.
    fn route_and_send(network: &Rc<RefCell<Network>>, node: NodeId, local_index: usize, next_hop: IPv4Address, datagram: crate::messages::IPv4Message) {
        let now = network.borrow().scheduler.delta_time();
        let (mac_src, src_ip, arp, max_fragment_size) = {
            let net = network.borrow();
            match net.nodes.get(&node) {
                Some(Node::Host(h)) => (
                    h.interfaces[local_index].hardware().mac(),
                    h.interfaces[local_index].primary_address(),
                    h.arp.clone(),
                    h.interfaces[local_index].max_fragment_size(),
                ),
                Some(Node::Router(r)) => (
                    r.interfaces[local_index].hardware().mac(),
                    r.interfaces[local_index].primary_address(),
                    r.arp.clone(),
                    r.interfaces[local_index].max_fragment_size(),
                ),
                _ => return,
            }
        };
        let Ok(fragments) = ipv4::fragment(&datagram, max_fragment_size) else { return };

        let mut broadcast_sent = false;
        for frag in &fragments {
            let bytes = ipv4::to_bytes(frag);
            let action = arp.borrow_mut().enqueue_request(next_hop, bytes, now);
            match action {
                ArpAction::SendUnicast { mac } => {
                    if let Ok(datalink) = DatalinkMessage::builder().mac_src(mac_src).mac_dst(mac).ethertype(EtherType::Ipv4).payload(ipv4::to_bytes(frag)).build() {
                        if let Some(interface) = Network::interface_for(network, InterfaceOwner { node, local_index }) {
                            let _ = Network::transmit(network, interface, datalink);
                        }
                    }
                }
                ArpAction::SendBroadcastRequest { target } => {
                    if broadcast_sent {
                        continue;
                    }
                    broadcast_sent = true;
                    // The ARP request's sender address is this egress
                    // interface's own IP, not the datagram's original source
                    // (a forwarded datagram's source lives on a different
                    // subnet from the router interface doing the resolving).
                    let request = ArpPacket::request(mac_src, src_ip.unwrap_or(datagram.src()), target);
                    if let Ok(datalink) = DatalinkMessage::builder().mac_src(mac_src).mac_dst(crate::addresses::MacAddress::BROADCAST).ethertype(EtherType::Arp).payload(request.to_bytes()).build() {
                        if let Some(interface) = Network::interface_for(network, InterfaceOwner { node, local_index }) {
                            let _ = Network::transmit(network, interface, datalink);
                        }
                    }
                }
                ArpAction::Queued => {}
            }
        }
    }

    fn interface_for(network: &Rc<RefCell<Network>>, owner: InterfaceOwner) -> Option<InterfaceId> {
        let net = network.borrow();
        net.interface_owner.iter().find(|(_, o)| o.node == owner.node && o.local_index == owner.local_index).map(|(id, _)| *id)
    }

    /// Starts this switch's periodic BPDU hello job (every
    /// [`Bpdu::DEFAULT_HELLO`] virtual seconds), following the same
    /// `Weak<RefCell<Network>>` self-scheduling idiom as `Network::transmit`'s
    /// delivery callback. The returned handle is the caller's to cancel;
    /// dropping it leaves the job running.
    pub fn start_stp_hellos(network: &Rc<RefCell<Network>>, node: NodeId) -> crate::scheduler::CancelHandle {
        let weak = Rc::downgrade(network);
        let scheduler = network.borrow().scheduler.clone();
        scheduler.repeat(Bpdu::DEFAULT_HELLO, move || {
            if let Some(network) = weak.upgrade() {
                Network::emit_hellos(&network, node);
            }
        })
    }

    /// Advances this switch's port FSM/MAC-table aging and transmits every
    /// BPDU it currently owes a hello for, 802.1Q-tagging each one the
    /// same way a learned frame would be tagged on egress. Piggybacking
    /// `tick_stp`/`age_mac_tables` on the hello cadence keeps forward-delay
    /// transitions, BPDU aging, and edge auto-detect moving without a
    /// second timer.
    fn emit_hellos(network: &Rc<RefCell<Network>>, node: NodeId) {
        let now = network.borrow().scheduler.delta_time();
        let hellos = {
            let mut net = network.borrow_mut();
            match net.nodes.get_mut(&node) {
                Some(Node::Switch(switch)) => {
                    switch.tick_stp(now);
                    switch.age_mac_tables(now);
                    switch.originate_hellos()
                }
                _ => return,
            }
        };
        for (port, vlan, bpdu) in hellos {
            let (mac_src, vlan_tag) = {
                let net = network.borrow();
                match net.nodes.get(&node) {
                    Some(Node::Switch(switch)) if port < switch.ports.len() => (switch.ports[port].mac(), switch.ports[port].egress_vlan_tag(vlan)),
                    _ => continue,
                }
            };
            let mut builder = DatalinkMessage::builder().mac_src(mac_src).mac_dst(crate::addresses::MacAddress::STP_MULTICAST).ethertype(EtherType::Stp).payload(bpdu.to_bytes());
            if let Some(tag) = vlan_tag {
                builder = builder.vlan(tag);
            }
            if let Ok(frame) = builder.build() {
                if let Some(interface) = Network::interface_for(network, InterfaceOwner { node, local_index: port }) {
                    let _ = Network::transmit(network, interface, frame);
                }
            }
        }
    }
}

fn decode_bpdu(bytes: &[u8]) -> Option<Bpdu> {
    Bpdu::from_bytes(bytes)
}

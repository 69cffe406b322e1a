//! End-to-end scenario: three hosts on one switch. A resolves B through
//! a flooded ARP request/reply pair.

use std::cell::RefCell;
use std::rc::Rc;

use netsimcore::addresses::{IPv4Address, IPv4Mask, MacAddress};
use netsimcore::hardware_interface::HardwareInterface;
use netsimcore::network::Network;
use netsimcore::network_interface::NetworkInterface;
use netsimcore::node::{Host, Node, Switch};
use netsimcore::scheduler::SchedulerConfig;

fn host(name: &str, mac: u8, ip: IPv4Address) -> Host {
    let mut iface = NetworkInterface::new(HardwareInterface::new(format!("{name}-eth0"), MacAddress::new([mac; 6])));
    iface.hardware_mut().set_link_up(true);
    iface.add_address(ip, IPv4Mask::from_prefix(24).unwrap()).unwrap();
    Host::new(name, vec![iface])
}

#[test]
fn arp_resolves_across_a_switch_via_flood_then_learned_unicast() {
    let network = Rc::new(RefCell::new(Network::new(SchedulerConfig::default())));

    let ports: Vec<HardwareInterface> = (0..3).map(|i| HardwareInterface::new(format!("Gi0/{i}"), MacAddress::new([100 + i as u8; 6]))).collect();
    let mut switch = Switch::new("sw1", ports, 32768, false);
    switch.wire_default_vlan(4);
    let (switch_node, switch_ifaces) = network.borrow_mut().add_switch(switch);
    if let Some(Node::Switch(s)) = network.borrow_mut().node_mut(switch_node) {
        s.stp.recompute(1, 0.0);
        s.stp.tick(30.0);
    }

    let (node_a, ifaces_a) = network.borrow_mut().add_host(host("a", 1, IPv4Address::new(10, 0, 0, 1)));
    let (node_b, ifaces_b) = network.borrow_mut().add_host(host("b", 2, IPv4Address::new(10, 0, 0, 2)));
    let (_node_c, ifaces_c) = network.borrow_mut().add_host(host("c", 3, IPv4Address::new(10, 0, 0, 3)));

    network.borrow_mut().add_link(ifaces_a[0], switch_ifaces[0], 2.0);
    network.borrow_mut().add_link(ifaces_b[0], switch_ifaces[1], 2.0);
    network.borrow_mut().add_link(ifaces_c[0], switch_ifaces[2], 2.0);

    let datagram = {
        let net = network.borrow();
        let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
        a.build_echo_request(0, IPv4Address::new(10, 0, 0, 2), 1, 0, vec![1]).unwrap()
    };
    Network::send_ipv4(&network, node_a, 0, datagram);

    network.borrow().scheduler.clone().run_until_idle();

    let net = network.borrow();
    let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
    assert!(a.arp.borrow().lookup(&IPv4Address::new(10, 0, 0, 2)).is_some());
    let Node::Host(b) = net.node(node_b).unwrap() else { unreachable!() };
    assert!(b.arp.borrow().lookup(&IPv4Address::new(10, 0, 0, 1)).is_none());
}

//! End-to-end scenario: two hosts on one link, ping resolves ARP and the
//! echo reply is delivered back to the tracker that is awaiting it.

use std::cell::RefCell;
use std::rc::Rc;

use netsimcore::addresses::{IPv4Address, IPv4Mask, MacAddress};
use netsimcore::hardware_interface::HardwareInterface;
use netsimcore::network::Network;
use netsimcore::network_interface::NetworkInterface;
use netsimcore::node::{Host, Node};
use netsimcore::protocols::icmp::EchoTracker;
use netsimcore::scheduler::SchedulerConfig;

fn host(name: &str, ip: IPv4Address, mac: MacAddress) -> Host {
    let mut iface = NetworkInterface::new(HardwareInterface::new(format!("{name}-eth0"), mac));
    iface.hardware_mut().set_link_up(true);
    iface.add_address(ip, IPv4Mask::from_prefix(24).unwrap()).unwrap();
    Host::new(name, vec![iface])
}

#[test]
fn ping_between_two_directly_linked_hosts_completes() {
    let network = Rc::new(RefCell::new(Network::new(SchedulerConfig::default())));

    let (node_a, ifaces_a) = network.borrow_mut().add_host(host("a", IPv4Address::new(10, 0, 0, 1), MacAddress::new([1; 6])));
    let (node_b, ifaces_b) = network.borrow_mut().add_host(host("b", IPv4Address::new(10, 0, 0, 2), MacAddress::new([2; 6])));
    network.borrow_mut().add_link(ifaces_a[0], ifaces_b[0], 50.0);
    if let Some(Node::Host(h)) = network.borrow_mut().node_mut(node_b) {
        h.interfaces[0].hardware_mut().set_link_up(true);
    }

    let scheduler = network.borrow().scheduler.clone();
    let (echo_tracker, identifier, rx) = {
        let net = network.borrow();
        let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
        let tracker = a.echo.clone();
        let (id, rx, _handle) = EchoTracker::track(&tracker, &scheduler, 30.0);
        (tracker, id, rx)
    };
    let _ = echo_tracker;

    let datagram = {
        let net = network.borrow();
        let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
        a.build_echo_request(0, IPv4Address::new(10, 0, 0, 2), identifier, 0, vec![1, 2, 3, 4]).unwrap()
    };
    Network::send_ipv4(&network, node_a, 0, datagram);

    scheduler.run_until_idle();

    let reply = rx.try_recv().expect("echo tracker should have resolved by now");
    let reply = reply.expect("echo request should have been answered, not timed out");
    assert_eq!(reply.identifier, identifier);
    assert_eq!(reply.payload, vec![1, 2, 3, 4]);

    let net = network.borrow();
    let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
    assert!(a.arp.borrow().lookup(&IPv4Address::new(10, 0, 0, 2)).is_some());
}

//! End-to-end scenario: a datagram too large for the sending interface's
//! configured fragment size is split into RFC-791 fragments by
//! `Network::route_and_send`, each crossing the link as its own frame,
//! and reassembled by the receiving host before being handed up to ICMP.
//! Mirrors the 40-byte-payload/`max_fragment=28` scenario: 8 data bytes
//! per fragment leaves exactly 5 fragments with offsets `{0,1,2,3,4}`.

use std::cell::RefCell;
use std::rc::Rc;

use netsimcore::addresses::{IPv4Address, IPv4Mask, MacAddress};
use netsimcore::hardware_interface::HardwareInterface;
use netsimcore::link::LinkEvent;
use netsimcore::listener::Outcome;
use netsimcore::network::Network;
use netsimcore::network_interface::NetworkInterface;
use netsimcore::node::{Host, Node};
use netsimcore::protocols::icmp::IcmpMessage;
use netsimcore::protocols::ipv4;
use netsimcore::scheduler::SchedulerConfig;

fn host_with(name: &str, ip: IPv4Address, mac: MacAddress, max_fragment_size: usize) -> Host {
    let mut iface = NetworkInterface::new(HardwareInterface::new(format!("{name}-eth0"), mac));
    iface.hardware_mut().set_link_up(true);
    iface.add_address(ip, IPv4Mask::from_prefix(24).unwrap()).unwrap();
    iface.set_max_fragment_size(max_fragment_size);
    Host::new(name, vec![iface])
}

#[test]
fn oversized_echo_crosses_the_link_in_five_fragments_and_reassembles() {
    let network = Rc::new(RefCell::new(Network::new(SchedulerConfig::default())));
    let (node_a, ifaces_a) = network.borrow_mut().add_host(host_with("a", IPv4Address::new(10, 0, 0, 1), MacAddress::new([1; 6]), 28));
    let (_node_b, ifaces_b) = network.borrow_mut().add_host(host_with("b", IPv4Address::new(10, 0, 0, 2), MacAddress::new([2; 6]), 1500));
    network.borrow_mut().add_link(ifaces_a[0], ifaces_b[0], 10.0);

    let request_frames = Rc::new(RefCell::new(Vec::new()));
    let offsets = request_frames.clone();
    let iface_a0 = ifaces_a[0];
    network.borrow_mut().add_tap(ifaces_a[0], move |event| {
        if let LinkEvent::SendBits { message, source, .. } = event {
            if *source == iface_a0 {
                offsets.borrow_mut().push(message.payload().to_vec());
            }
        }
        Outcome::Continue
    });

    let reply_frames = Rc::new(RefCell::new(Vec::new()));
    let replies = reply_frames.clone();
    let iface_b0 = ifaces_b[0];
    network.borrow_mut().add_tap(ifaces_b[0], move |event| {
        if let LinkEvent::SendBits { message, source, .. } = event {
            if *source == iface_b0 {
                replies.borrow_mut().push(message.payload().to_vec());
            }
        }
        Outcome::Continue
    });

    // 8-byte ICMP header + 32-byte payload = 40-byte IPv4 payload; at
    // max_fragment_size=28, each fragment carries 8 bytes of data.
    let icmp_payload = vec![0xAB; 32];
    let datagram = {
        let net = network.borrow();
        let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
        a.build_echo_request(0, IPv4Address::new(10, 0, 0, 2), 9, 0, icmp_payload.clone()).unwrap()
    };
    Network::send_ipv4(&network, node_a, 0, datagram);

    network.borrow().scheduler.clone().run_until_idle();

    let requests = request_frames.borrow();
    assert_eq!(requests.len(), 5, "a 40-byte IPv4 payload at max_fragment_size=28 must split into 5 fragments");
    let mut fragments: Vec<_> = requests.iter().map(|bytes| ipv4::from_bytes(bytes).unwrap()).collect();
    fragments.sort_by_key(|f| f.fragment_offset());
    let expected_offsets: Vec<u16> = (0..5).collect();
    assert_eq!(fragments.iter().map(|f| f.fragment_offset()).collect::<Vec<_>>(), expected_offsets);
    assert_eq!(fragments.iter().map(|f| f.flags().more_fragments).collect::<Vec<_>>(), vec![true, true, true, true, false]);
    assert!(fragments.iter().all(|f| f.identification() == fragments[0].identification()), "all fragments share one identification");

    let replies = reply_frames.borrow();
    assert_eq!(replies.len(), 1, "the 40-byte reply fits under host b's default max_fragment_size, so it crosses whole");
    let reply_datagram = ipv4::from_bytes(&replies[0]).unwrap();
    let reply_icmp = IcmpMessage::from_bytes(reply_datagram.payload()).unwrap();
    assert_eq!(reply_icmp.payload, icmp_payload, "the reassembled request's payload should echo back unchanged");
}

#[test]
fn small_payload_crosses_in_a_single_frame() {
    let network = Rc::new(RefCell::new(Network::new(SchedulerConfig::default())));
    let (node_a, ifaces_a) = network.borrow_mut().add_host(host_with("a", IPv4Address::new(10, 0, 0, 1), MacAddress::new([1; 6]), 1500));
    let (_node_b, ifaces_b) = network.borrow_mut().add_host(host_with("b", IPv4Address::new(10, 0, 0, 2), MacAddress::new([2; 6]), 1500));
    network.borrow_mut().add_link(ifaces_a[0], ifaces_b[0], 10.0);

    let request_frames = Rc::new(RefCell::new(0usize));
    let count = request_frames.clone();
    let iface_a0 = ifaces_a[0];
    network.borrow_mut().add_tap(ifaces_a[0], move |event| {
        if let LinkEvent::SendBits { source, .. } = event {
            if *source == iface_a0 {
                *count.borrow_mut() += 1;
            }
        }
        Outcome::Continue
    });

    let datagram = {
        let net = network.borrow();
        let Node::Host(a) = net.node(node_a).unwrap() else { unreachable!() };
        a.build_echo_request(0, IPv4Address::new(10, 0, 0, 2), 1, 0, vec![1, 2, 3, 4]).unwrap()
    };
    Network::send_ipv4(&network, node_a, 0, datagram);
    network.borrow().scheduler.clone().run_until_idle();

    assert_eq!(*request_frames.borrow(), 1);
}

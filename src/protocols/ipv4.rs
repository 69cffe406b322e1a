//! IPv4: header checksum, RFC-791 fragmentation on send, reassembly on
//! receive, and longest-prefix-match forwarding. Grounded on the pack's
//! `67406dd8_SlopLabs-slopos` `net/ipv4.rs` for header/fragment field
//! layout, adapted to this crate's builder-based `IPv4Message`.

use std::collections::HashMap;

use itertools::Itertools;

use crate::addresses::{IPv4Address, IPv4Mask};
use crate::errors::SimError;
use crate::messages::{FragmentFlags, IPv4Message, IPv4Protocol};

const MIN_FRAGMENT_SIZE: usize = 28;
const MAX_FRAGMENT_SIZE: usize = 65_535;

/// Recommended period for the repeating purge job callers should register.
pub const REASSEMBLY_PURGE_PERIOD: f64 = 10.0;
const REASSEMBLY_TIMEOUT: f64 = 300.0;

/// RFC-1071 one's-complement checksum over 16-bit words, with the
/// checksum field itself treated as zero. Shared by the IPv4 header and
/// ICMP (whose checksum covers type/code/identifier/sequence/payload).
pub fn internet_checksum(words: impl Iterator<Item = u8>) -> u16 {
    let mut sum: u32 = 0;
    for (hi, lo) in words.chain(std::iter::once(0)).tuples() {
        sum += u32::from(hi) << 8 | u32::from(lo);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Computes the IPv4 header checksum over the 20-byte fixed header with
/// the checksum field zeroed, including the source/destination words.
pub fn header_checksum(message: &IPv4Message) -> u16 {
    let mut header = Vec::with_capacity(20);
    header.push((message.version() << 4) | message.ihl());
    header.push(message.tos());
    header.extend_from_slice(&message.total_length().to_be_bytes());
    header.extend_from_slice(&message.identification().to_be_bytes());
    let flags_and_offset = (message.flags().to_bits() as u16) << 13 | message.fragment_offset();
    header.extend_from_slice(&flags_and_offset.to_be_bytes());
    header.push(message.ttl());
    header.push(message.protocol().as_u8());
    header.extend_from_slice(&[0, 0]); // checksum field, zeroed
    header.extend_from_slice(&message.src().octets());
    header.extend_from_slice(&message.dst().octets());
    internet_checksum(header.into_iter())
}

pub fn verify_checksum(message: &IPv4Message) -> bool {
    header_checksum(message) == message.checksum()
}

/// Serializes the 20-byte fixed header plus payload to wire bytes, so a
/// datagram can sit in an ARP pending queue or a link's payload as plain
/// `Vec<u8>` while awaiting resolution or delivery.
pub fn to_bytes(message: &IPv4Message) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(20 + message.payload().len());
    bytes.push((message.version() << 4) | message.ihl());
    bytes.push(message.tos());
    bytes.extend_from_slice(&message.total_length().to_be_bytes());
    bytes.extend_from_slice(&message.identification().to_be_bytes());
    let flags_and_offset = (message.flags().to_bits() as u16) << 13 | message.fragment_offset();
    bytes.extend_from_slice(&flags_and_offset.to_be_bytes());
    bytes.push(message.ttl());
    bytes.push(message.protocol().as_u8());
    bytes.extend_from_slice(&message.checksum().to_be_bytes());
    bytes.extend_from_slice(&message.src().octets());
    bytes.extend_from_slice(&message.dst().octets());
    bytes.extend_from_slice(message.payload());
    bytes
}

/// Parses what [`to_bytes`] produces. Does not re-verify the checksum;
/// callers that care use [`verify_checksum`] on the result.
pub fn from_bytes(bytes: &[u8]) -> Result<IPv4Message, SimError> {
    if bytes.len() < 20 {
        return Err(SimError::InvalidConfiguration { reason: "ipv4 datagram shorter than fixed header".into() });
    }
    let flags_and_offset = u16::from_be_bytes([bytes[6], bytes[7]]);
    let flags = FragmentFlags::from_bits((flags_and_offset >> 13) as u8);
    let fragment_offset = flags_and_offset & 0x1FFF;
    let src = IPv4Address::new(bytes[12], bytes[13], bytes[14], bytes[15]);
    let dst = IPv4Address::new(bytes[16], bytes[17], bytes[18], bytes[19]);
    let protocol = IPv4Protocol::from_u8(bytes[9]);
    let payload = bytes[20..].to_vec();

    IPv4Message::builder()
        .tos(bytes[1])
        .identification(u16::from_be_bytes([bytes[4], bytes[5]]))
        .flags(flags)
        .fragment_offset(fragment_offset)
        .ttl(bytes[8])
        .protocol(protocol)
        .src(src)
        .dst(dst)
        .payload(payload)
        .build()
}

/// Splits `message`'s payload into RFC-791 fragments: every fragment's
/// data size is a multiple of 8 octets except the last, `fragment_offset`
/// is in 8-octet units, `more_fragments` is set on all but the last, and
/// `identification` is shared across the set.
pub fn fragment(message: &IPv4Message, max_fragment_size: usize) -> Result<Vec<IPv4Message>, SimError> {
    if !(MIN_FRAGMENT_SIZE..=MAX_FRAGMENT_SIZE).contains(&max_fragment_size) {
        return Err(SimError::InvalidConfiguration {
            reason: format!("max fragment size {} outside [{}, {}]", max_fragment_size, MIN_FRAGMENT_SIZE, MAX_FRAGMENT_SIZE),
        });
    }
    let max_data = (max_fragment_size - 20) / 8 * 8;
    let payload = message.payload();
    if payload.len() <= max_fragment_size - 20 {
        return Ok(vec![message.clone()]);
    }

    let mut fragments = Vec::new();
    let mut offset_bytes = 0usize;
    while offset_bytes < payload.len() {
        let remaining = payload.len() - offset_bytes;
        let chunk = remaining.min(max_data);
        let is_last = offset_bytes + chunk >= payload.len();
        let data = payload[offset_bytes..offset_bytes + chunk].to_vec();
        let frag = IPv4Message::builder()
            .src(message.src())
            .dst(message.dst())
            .protocol(message.protocol())
            .ttl(message.ttl())
            .tos(message.tos())
            .identification(message.identification())
            .fragment_offset((offset_bytes / 8) as u16)
            .flags(FragmentFlags { more_fragments: !is_last, ..message.flags() })
            .payload(data)
            .build()?;
        fragments.push(frag);
        offset_bytes += chunk;
    }
    Ok(fragments)
}

#[derive(Hash, Eq, PartialEq, Clone, Copy)]
pub struct ReassemblyKey {
    pub ingress_iface: crate::ids::InterfaceId,
    pub net_src: IPv4Address,
    pub identification: u16,
}

struct ReassemblyBuffer {
    fragments: Vec<IPv4Message>,
    last_seen: f64,
}

/// Per-(ingress interface, source, identification) reassembly state.
/// The owner (a router/host's IPv4 service) is expected to register a
/// `scheduler.repeat(10.0, ..)` job calling [`ReassemblyBuffers::purge_idle`]
/// and retain its `CancelHandle` for teardown, per §5's cancellation rule.
#[derive(Default)]
pub struct ReassemblyBuffers {
    buffers: HashMap<ReassemblyKey, ReassemblyBuffer>,
}

impl ReassemblyBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purge_idle(&mut self, now: f64) {
        self.buffers.retain(|_, buf| now - buf.last_seen <= REASSEMBLY_TIMEOUT);
    }

    /// Feeds one fragment in; returns `Some(reassembled)` once the buffer
    /// holds a contiguous run from offset 0 through a `more_fragments =
    /// false` fragment whose payload sums correctly.
    pub fn accept(&mut self, key: ReassemblyKey, fragment: IPv4Message, now: f64) -> Option<IPv4Message> {
        if !fragment.flags().more_fragments && fragment.fragment_offset() == 0 {
            return Some(fragment);
        }

        let buffer = self.buffers.entry(key).or_insert_with(|| ReassemblyBuffer { fragments: Vec::new(), last_seen: now });
        buffer.last_seen = now;
        buffer.fragments.push(fragment);
        buffer.fragments.sort_by_key(|f| f.fragment_offset());

        let last = buffer.fragments.iter().find(|f| !f.flags().more_fragments)?;
        let expected_total = last.fragment_offset() as usize * 8 + last.payload().len();

        let mut contiguous = 0usize;
        for frag in buffer.fragments.iter() {
            let frag_start = frag.fragment_offset() as usize * 8;
            if frag_start != contiguous {
                return None;
            }
            contiguous += frag.payload().len();
        }
        if contiguous != expected_total {
            return None;
        }

        let mut payload = Vec::with_capacity(expected_total);
        for frag in buffer.fragments.iter() {
            payload.extend_from_slice(frag.payload());
        }
        let first = buffer.fragments.first().unwrap();
        let reassembled = IPv4Message::builder()
            .src(first.src())
            .dst(first.dst())
            .protocol(first.protocol())
            .ttl(first.ttl())
            .tos(first.tos())
            .identification(first.identification())
            .payload(payload)
            .build()
            .ok()?;
        self.buffers.remove(&key);
        Some(reassembled)
    }
}

/// Longest-prefix-match lookup over an ordered routing table.
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

#[derive(Clone)]
pub struct RouteEntry {
    pub network: IPv4Address,
    pub mask: IPv4Mask,
    pub next_hop: Option<IPv4Address>,
    /// Index into the owning router's interface list this route egresses.
    pub interface: usize,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, entry: RouteEntry) {
        self.entries.push(entry);
    }

    pub fn remove_routes_via(&mut self, next_hop: &IPv4Address) {
        self.entries.retain(|e| e.next_hop.as_ref() != Some(next_hop));
    }

    /// Longest-prefix match: among entries whose `(dst & mask) == (network
    /// & mask)`, the one with the longest mask wins; ties keep the first
    /// (registration order), matching "first whose masked network matches".
    pub fn lookup(&self, dst: &IPv4Address) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .filter(|e| dst.network(&e.mask) == e.network.network(&e.mask))
            .max_by_key(|e| e.mask.cidr_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload_len: usize) -> IPv4Message {
        IPv4Message::builder()
            .src(IPv4Address::new(10, 0, 0, 1))
            .dst(IPv4Address::new(10, 0, 0, 2))
            .protocol(IPv4Protocol::Icmp)
            .identification(0xBEEF)
            .payload(vec![0xAB; payload_len])
            .build()
            .unwrap()
    }

    #[test]
    fn to_bytes_from_bytes_round_trips() {
        let msg = sample(16);
        let bytes = to_bytes(&msg);
        let parsed = from_bytes(&bytes).unwrap();
        assert_eq!(parsed.src(), msg.src());
        assert_eq!(parsed.dst(), msg.dst());
        assert_eq!(parsed.payload(), msg.payload());
        assert!(verify_checksum(&parsed));
    }

    #[test]
    fn checksum_round_trips() {
        let msg = sample(16);
        assert!(verify_checksum(&msg));
    }

    #[test]
    fn fragment_then_reassemble_is_idempotent() {
        let msg = sample(2000);
        let frags = fragment(&msg, 520).unwrap();
        assert!(frags.len() > 1);
        assert!(frags.iter().rev().skip(1).all(|f| f.flags().more_fragments));
        assert!(!frags.last().unwrap().flags().more_fragments);

        let mut buffers = ReassemblyBuffers::new();
        let key = ReassemblyKey { ingress_iface: crate::ids::InterfaceId(0), net_src: msg.src(), identification: msg.identification() };
        let mut result = None;
        for frag in frags {
            result = buffers.accept(key, frag, 0.0);
        }
        let reassembled = result.unwrap();
        assert_eq!(reassembled.payload(), msg.payload());
    }

    #[test]
    fn small_payload_is_not_fragmented() {
        let msg = sample(8);
        let frags = fragment(&msg, 1500).unwrap();
        assert_eq!(frags.len(), 1);
    }

    #[test]
    fn reassembly_purges_idle_buffers() {
        let mut buffers = ReassemblyBuffers::new();
        let key = ReassemblyKey { ingress_iface: crate::ids::InterfaceId(0), net_src: IPv4Address::new(1, 1, 1, 1), identification: 1 };
        let frag = IPv4Message::builder()
            .src(IPv4Address::new(1, 1, 1, 1))
            .dst(IPv4Address::new(2, 2, 2, 2))
            .protocol(IPv4Protocol::Icmp)
            .fragment_offset(0)
            .flags(FragmentFlags { more_fragments: true, ..Default::default() })
            .payload(vec![0; 8])
            .build()
            .unwrap();
        buffers.accept(key, frag, 0.0);
        buffers.purge_idle(400.0);
        assert!(buffers.accept(key, sample(8), 400.0).is_some());
    }

    #[test]
    fn routing_table_prefers_longest_prefix() {
        let mut table = RoutingTable::new();
        table.add_route(RouteEntry {
            network: IPv4Address::new(10, 0, 0, 0),
            mask: IPv4Mask::from_prefix(8).unwrap(),
            next_hop: Some(IPv4Address::new(192, 168, 0, 1)),
            interface: 0,
        });
        table.add_route(RouteEntry {
            network: IPv4Address::new(10, 0, 1, 0),
            mask: IPv4Mask::from_prefix(24).unwrap(),
            next_hop: Some(IPv4Address::new(192, 168, 0, 2)),
            interface: 1,
        });
        let route = table.lookup(&IPv4Address::new(10, 0, 1, 5)).unwrap();
        assert_eq!(route.next_hop, Some(IPv4Address::new(192, 168, 0, 2)));
    }
}

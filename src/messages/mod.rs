//! Message hierarchy: `PhysicalMessage` → `DatalinkMessage` → `NetworkMessage`
//! → `IPv4Message`. Every layer adds fields to the one below it and is
//! immutable once built, via a builder that mirrors the teacher's
//! `DhcpV4Packet`/`DhcpOptions` accumulate-then-freeze style in
//! `core::message_type`.

use crate::addresses::{IPv4Address, MacAddress};
use crate::errors::SimError;

/// The bottom of the hierarchy: only a length in bytes, used by the
/// scheduler's transmission-delay calculation before any framing exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalMessage {
    length: usize,
}

impl PhysicalMessage {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

/// EtherType values relevant to this simulator (not an exhaustive IANA list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Stp,
}

impl EtherType {
    pub fn as_u16(&self) -> u16 {
        match self {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Stp => 0x0026, // length field repurposed for LLC/STP BPDUs
        }
    }
}

/// A framed Ethernet/802.1Q frame. `vlan` is `Some(id)` only once a tag has
/// been applied (trunk egress, or access-port ingress tagging internally).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatalinkMessage {
    mac_src: MacAddress,
    mac_dst: MacAddress,
    ethertype: EtherType,
    vlan: Option<u16>,
    payload: Vec<u8>,
}

impl DatalinkMessage {
    pub fn mac_src(&self) -> MacAddress {
        self.mac_src
    }

    pub fn mac_dst(&self) -> MacAddress {
        self.mac_dst
    }

    pub fn ethertype(&self) -> EtherType {
        self.ethertype
    }

    pub fn vlan(&self) -> Option<u16> {
        self.vlan
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn with_vlan(&self, vlan: Option<u16>) -> Self {
        Self { vlan, ..self.clone() }
    }

    /// Frame size on the wire: 14-byte Ethernet header, plus 4 if tagged,
    /// plus the payload.
    pub fn wire_length(&self) -> usize {
        14 + if self.vlan.is_some() { 4 } else { 0 } + self.payload.len()
    }

    pub fn builder() -> DatalinkMessageBuilder {
        DatalinkMessageBuilder::default()
    }
}

#[derive(Default)]
pub struct DatalinkMessageBuilder {
    mac_src: Option<MacAddress>,
    mac_dst: Option<MacAddress>,
    ethertype: Option<EtherType>,
    vlan: Option<u16>,
    payload: Vec<u8>,
}

impl DatalinkMessageBuilder {
    pub fn mac_src(mut self, mac: MacAddress) -> Self {
        self.mac_src = Some(mac);
        self
    }

    pub fn mac_dst(mut self, mac: MacAddress) -> Self {
        self.mac_dst = Some(mac);
        self
    }

    pub fn ethertype(mut self, ethertype: EtherType) -> Self {
        self.ethertype = Some(ethertype);
        self
    }

    pub fn vlan(mut self, vlan: u16) -> Self {
        self.vlan = Some(vlan);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Result<DatalinkMessage, SimError> {
        Ok(DatalinkMessage {
            mac_src: self.mac_src.ok_or_else(|| SimError::InvalidConfiguration {
                reason: "datalink message missing mac_src".into(),
            })?,
            mac_dst: self.mac_dst.ok_or_else(|| SimError::InvalidConfiguration {
                reason: "datalink message missing mac_dst".into(),
            })?,
            ethertype: self.ethertype.ok_or_else(|| SimError::InvalidConfiguration {
                reason: "datalink message missing ethertype".into(),
            })?,
            vlan: self.vlan,
            payload: self.payload,
        })
    }
}

/// Adds network-layer source/destination to the datalink payload. Carried
/// as a thin wrapper so ARP (which has no IPv4 header) and IPv4 both fit
/// the same "network message" shape the listener chain dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMessage {
    net_src: IPv4Address,
    net_dst: IPv4Address,
    payload: Vec<u8>,
}

impl NetworkMessage {
    pub fn new(net_src: IPv4Address, net_dst: IPv4Address, payload: Vec<u8>) -> Self {
        Self { net_src, net_dst, payload }
    }

    pub fn net_src(&self) -> IPv4Address {
        self.net_src
    }

    pub fn net_dst(&self) -> IPv4Address {
        self.net_dst
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// The three IPv4 fragmentation flag bits, in the order the spec names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentFlags {
    pub reserved: bool,
    pub dont_fragment: bool,
    pub more_fragments: bool,
}

impl FragmentFlags {
    pub fn to_bits(&self) -> u8 {
        (self.reserved as u8) << 2 | (self.dont_fragment as u8) << 1 | (self.more_fragments as u8)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            reserved: bits & 0b100 != 0,
            dont_fragment: bits & 0b010 != 0,
            more_fragments: bits & 0b001 != 0,
        }
    }
}

/// IPv4 protocol numbers this simulator carries (not exhaustive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPv4Protocol {
    Icmp,
    Udp,
    Tcp,
    Ospf,
    Other(u8),
}

impl IPv4Protocol {
    pub fn as_u8(&self) -> u8 {
        match self {
            IPv4Protocol::Icmp => 1,
            IPv4Protocol::Tcp => 6,
            IPv4Protocol::Udp => 17,
            IPv4Protocol::Ospf => 89,
            IPv4Protocol::Other(n) => *n,
        }
    }

    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => IPv4Protocol::Icmp,
            6 => IPv4Protocol::Tcp,
            17 => IPv4Protocol::Udp,
            89 => IPv4Protocol::Ospf,
            other => IPv4Protocol::Other(other),
        }
    }
}

/// The full IPv4 header plus payload, built once and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IPv4Message {
    version: u8,
    ihl: u8,
    tos: u8,
    total_length: u16,
    identification: u16,
    flags: FragmentFlags,
    fragment_offset: u16,
    ttl: u8,
    protocol: IPv4Protocol,
    checksum: u16,
    src: IPv4Address,
    dst: IPv4Address,
    payload: Vec<u8>,
}

impl IPv4Message {
    pub fn version(&self) -> u8 {
        self.version
    }
    pub fn ihl(&self) -> u8 {
        self.ihl
    }
    pub fn tos(&self) -> u8 {
        self.tos
    }
    pub fn total_length(&self) -> u16 {
        self.total_length
    }
    pub fn identification(&self) -> u16 {
        self.identification
    }
    pub fn flags(&self) -> FragmentFlags {
        self.flags
    }
    /// Offset in 8-octet units, per RFC 791.
    pub fn fragment_offset(&self) -> u16 {
        self.fragment_offset
    }
    pub fn ttl(&self) -> u8 {
        self.ttl
    }
    pub fn protocol(&self) -> IPv4Protocol {
        self.protocol
    }
    pub fn checksum(&self) -> u16 {
        self.checksum
    }
    pub fn src(&self) -> IPv4Address {
        self.src
    }
    pub fn dst(&self) -> IPv4Address {
        self.dst
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn with_ttl(&self, ttl: u8) -> Self {
        Self { ttl, ..self.clone() }
    }

    pub fn builder() -> IPv4MessageBuilder {
        IPv4MessageBuilder::default()
    }
}

pub struct IPv4MessageBuilder {
    tos: u8,
    identification: u16,
    flags: FragmentFlags,
    fragment_offset: u16,
    ttl: u8,
    protocol: Option<IPv4Protocol>,
    src: Option<IPv4Address>,
    dst: Option<IPv4Address>,
    payload: Vec<u8>,
}

impl Default for IPv4MessageBuilder {
    fn default() -> Self {
        Self {
            tos: 0,
            identification: 0,
            flags: FragmentFlags::default(),
            fragment_offset: 0,
            ttl: 64,
            protocol: None,
            src: None,
            dst: None,
            payload: Vec::new(),
        }
    }
}

impl IPv4MessageBuilder {
    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    pub fn identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    pub fn flags(mut self, flags: FragmentFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn fragment_offset(mut self, offset_units: u16) -> Self {
        self.fragment_offset = offset_units;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: IPv4Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn src(mut self, src: IPv4Address) -> Self {
        self.src = Some(src);
        self
    }

    pub fn dst(mut self, dst: IPv4Address) -> Self {
        self.dst = Some(dst);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Result<IPv4Message, SimError> {
        const HEADER_BYTES: u16 = 20;
        let total_length = HEADER_BYTES + self.payload.len() as u16;
        let src = self.src.ok_or_else(|| SimError::InvalidConfiguration {
            reason: "ipv4 message missing src".into(),
        })?;
        let dst = self.dst.ok_or_else(|| SimError::InvalidConfiguration {
            reason: "ipv4 message missing dst".into(),
        })?;
        let protocol = self.protocol.ok_or_else(|| SimError::InvalidConfiguration {
            reason: "ipv4 message missing protocol".into(),
        })?;
        if self.ttl == 0 {
            return Err(SimError::InvalidConfiguration { reason: "ipv4 ttl must be in [1, 255], got 0".into() });
        }
        let mut message = IPv4Message {
            version: 4,
            ihl: 5,
            tos: self.tos,
            total_length,
            identification: self.identification,
            flags: self.flags,
            fragment_offset: self.fragment_offset,
            ttl: self.ttl,
            protocol,
            checksum: 0,
            src,
            dst,
            payload: self.payload,
        };
        message.checksum = crate::protocols::ipv4::header_checksum(&message);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datalink_builder_requires_fields() {
        let err = DatalinkMessage::builder().build();
        assert!(err.is_err());
    }

    #[test]
    fn datalink_builder_happy_path() {
        let msg = DatalinkMessage::builder()
            .mac_src(MacAddress::new([1, 2, 3, 4, 5, 6]))
            .mac_dst(MacAddress::BROADCAST)
            .ethertype(EtherType::Arp)
            .payload(vec![0u8; 28])
            .build()
            .unwrap();
        assert_eq!(msg.wire_length(), 14 + 28);
        let tagged = msg.with_vlan(Some(10));
        assert_eq!(tagged.wire_length(), 14 + 4 + 28);
    }

    #[test]
    fn fragment_flags_round_trip_bits() {
        let flags = FragmentFlags { reserved: false, dont_fragment: true, more_fragments: true };
        assert_eq!(FragmentFlags::from_bits(flags.to_bits()), flags);
    }

    #[test]
    fn ipv4_builder_computes_total_length_and_checksum() {
        let msg = IPv4Message::builder()
            .src(IPv4Address::new(10, 0, 0, 1))
            .dst(IPv4Address::new(10, 0, 0, 2))
            .protocol(IPv4Protocol::Icmp)
            .payload(vec![0u8; 8])
            .build()
            .unwrap();
        assert_eq!(msg.total_length(), 28);
        assert_ne!(msg.checksum(), 0);
    }

    #[test]
    fn ipv4_builder_rejects_zero_ttl() {
        let err = IPv4Message::builder()
            .src(IPv4Address::new(10, 0, 0, 1))
            .dst(IPv4Address::new(10, 0, 0, 2))
            .protocol(IPv4Protocol::Icmp)
            .ttl(0)
            .payload(vec![0u8; 8])
            .build();
        assert!(matches!(err, Err(SimError::InvalidConfiguration { .. })));
    }
}

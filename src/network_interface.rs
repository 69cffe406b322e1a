//! The network-layer endpoint: wraps a [`HardwareInterface`] and owns
//! zero or more `(address, mask)` pairs plus an optional DHCP client
//! handle. Grounded on the teacher's `core::leases` (per-interface lease
//! state), generalized to the richer address-list model the spec wants.

use crate::addresses::{IPv4Address, IPv4Mask};
use crate::errors::SimError;
use crate::hardware_interface::HardwareInterface;

/// Default egress fragmentation threshold, mirroring a classic Ethernet
/// MTU (20-byte IPv4 header + 1480 bytes of data per fragment).
const DEFAULT_MAX_FRAGMENT_SIZE: usize = 1500;

pub struct NetworkInterface {
    hardware: HardwareInterface,
    addresses: Vec<(IPv4Address, IPv4Mask)>,
    loopback: bool,
    dhcp_client: Option<crate::protocols::dhcp::client::DhcpClientState>,
    max_fragment_size: usize,
}

impl NetworkInterface {
    pub fn new(hardware: HardwareInterface) -> Self {
        Self {
            hardware,
            addresses: Vec::new(),
            loopback: false,
            dhcp_client: None,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
        }
    }

    pub fn loopback(name: impl Into<String>) -> Self {
        let hw = HardwareInterface::new(name, crate::addresses::MacAddress::new([0; 6]));
        let mut iface = Self::new(hw);
        iface.loopback = true;
        iface
    }

    /// The largest IPv4 datagram (header + data) this interface sends
    /// without fragmenting, per §4.7's egress fragmentation rule.
    pub fn max_fragment_size(&self) -> usize {
        self.max_fragment_size
    }

    /// Overrides the fragmentation threshold; the builder-level bound of
    /// `[28, 65535]` is enforced at fragmentation time, not here.
    pub fn set_max_fragment_size(&mut self, size: usize) {
        self.max_fragment_size = size;
    }

    pub fn hardware(&self) -> &HardwareInterface {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut HardwareInterface {
        &mut self.hardware
    }

    pub fn is_loopback(&self) -> bool {
        self.loopback
    }

    pub fn addresses(&self) -> &[(IPv4Address, IPv4Mask)] {
        &self.addresses
    }

    /// Adds `(address, mask)`. Rejects duplicate addresses per the
    /// `NetworkInterface` invariant; the caller is responsible for
    /// constructing a genuine `IPv4Mask` (the type itself validates
    /// contiguity at construction).
    pub fn add_address(&mut self, address: IPv4Address, mask: IPv4Mask) -> Result<(), SimError> {
        if self.addresses.iter().any(|(a, _)| *a == address) {
            return Err(SimError::InvalidConfiguration {
                reason: format!("duplicate address {} on interface", address),
            });
        }
        self.addresses.push((address, mask));
        Ok(())
    }

    pub fn remove_address(&mut self, address: &IPv4Address) {
        self.addresses.retain(|(a, _)| a != address);
    }

    /// An interface "has" an address iff it is broadcast or one of its
    /// configured addresses.
    pub fn has_address(&self, address: &IPv4Address) -> bool {
        address.is_broadcast() || self.addresses.iter().any(|(a, _)| a == address)
    }

    /// Returns the configured mask that makes `address` routable out of
    /// this interface (used to decide whether a destination is on-link).
    pub fn contains_subnet(&self, address: &IPv4Address) -> Option<&(IPv4Address, IPv4Mask)> {
        self.addresses.iter().find(|(a, m)| a.in_same_network(m, address))
    }

    pub fn primary_address(&self) -> Option<IPv4Address> {
        self.addresses.first().map(|(a, _)| *a)
    }

    pub fn dhcp_client(&self) -> Option<&crate::protocols::dhcp::client::DhcpClientState> {
        self.dhcp_client.as_ref()
    }

    pub fn dhcp_client_mut(&mut self) -> Option<&mut crate::protocols::dhcp::client::DhcpClientState> {
        self.dhcp_client.as_mut()
    }

    pub fn install_dhcp_client(&mut self, state: crate::protocols::dhcp::client::DhcpClientState) {
        self.dhcp_client = Some(state);
    }

    pub fn clear_dhcp_client(&mut self) {
        self.dhcp_client = None;
    }
}

//! The physical/data-link layer endpoint: MAC address, speed/duplex,
//! admin/link state, and VLAN mode. Grounded on the teacher's
//! `core::packet_context::HardwareAddress` for the MAC-address plumbing,
//! generalized into the fuller interface record the specification
//! describes. The MAC-learning table lives in `protocols::ethernet`
//! instead, scoped to a whole `Switch` rather than one port.

use crate::addresses::MacAddress;
use crate::errors::SimError;
use crate::messages::DatalinkMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanMode {
    Access,
    Trunk,
}

const VALID_SPEEDS_MBPS: [u32; 3] = [10, 100, 1000];

pub struct HardwareInterface {
    name: String,
    mac: MacAddress,
    admin_up: bool,
    link_up: bool,
    duplex: Duplex,
    min_speed: u32,
    max_speed: u32,
    current_speed: u32,
    vlan_mode: VlanMode,
    access_vlan: u16,
    native_vlan: u16,
    allowed_vlans: Vec<u16>,
}

impl HardwareInterface {
    pub fn new(name: impl Into<String>, mac: MacAddress) -> Self {
        Self {
            name: name.into(),
            mac,
            admin_up: true,
            link_up: false,
            duplex: Duplex::Full,
            min_speed: 10,
            max_speed: 1000,
            current_speed: 1000,
            vlan_mode: VlanMode::Access,
            access_vlan: 1,
            native_vlan: 1,
            allowed_vlans: vec![1],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn is_admin_up(&self) -> bool {
        self.admin_up
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up
    }

    /// A frame may only be sent when both admin and link state are up.
    pub fn can_transmit(&self) -> bool {
        self.admin_up && self.link_up
    }

    pub fn set_admin_up(&mut self, up: bool) {
        self.admin_up = up;
    }

    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    pub fn duplex(&self) -> Duplex {
        self.duplex
    }

    pub fn set_duplex(&mut self, duplex: Duplex) {
        self.duplex = duplex;
    }

    pub fn current_speed(&self) -> u32 {
        self.current_speed
    }

    /// Enforces `current_speed in {10,100,1000} intersect [min,max]`.
    pub fn set_speed(&mut self, speed: u32) -> Result<(), SimError> {
        if !VALID_SPEEDS_MBPS.contains(&speed) || speed < self.min_speed || speed > self.max_speed {
            return Err(SimError::InvalidConfiguration {
                reason: format!(
                    "speed {} outside valid set {:?} or bounds [{}, {}]",
                    speed, VALID_SPEEDS_MBPS, self.min_speed, self.max_speed
                ),
            });
        }
        self.current_speed = speed;
        Ok(())
    }

    pub fn set_speed_bounds(&mut self, min: u32, max: u32) {
        self.min_speed = min;
        self.max_speed = max;
    }

    pub fn vlan_mode(&self) -> VlanMode {
        self.vlan_mode
    }

    pub fn set_vlan_mode(&mut self, mode: VlanMode) {
        self.vlan_mode = mode;
    }

    pub fn access_vlan(&self) -> u16 {
        self.access_vlan
    }

    pub fn set_access_vlan(&mut self, vlan: u16) {
        self.access_vlan = vlan;
    }

    pub fn native_vlan(&self) -> u16 {
        self.native_vlan
    }

    pub fn allowed_vlans(&self) -> &[u16] {
        &self.allowed_vlans
    }

    pub fn allow_vlan(&mut self, vlan: u16) {
        if !self.allowed_vlans.contains(&vlan) {
            self.allowed_vlans.push(vlan);
        }
    }

    /// Ingress VLAN resolution per §4.5: untagged frames get the port's
    /// access/native VLAN; tagged frames are validated against port mode.
    pub fn resolve_ingress_vlan(&self, frame: &DatalinkMessage) -> Result<u16, SimError> {
        match (self.vlan_mode, frame.vlan()) {
            (VlanMode::Access, None) => Ok(self.access_vlan),
            (VlanMode::Access, Some(_)) => {
                Err(SimError::InvalidConfiguration { reason: "tagged frame on access port".into() })
            }
            (VlanMode::Trunk, None) => Ok(self.native_vlan),
            (VlanMode::Trunk, Some(vlan)) => {
                if self.allowed_vlans.contains(&vlan) {
                    Ok(vlan)
                } else {
                    Err(SimError::InvalidConfiguration {
                        reason: format!("vlan {} not allowed on trunk", vlan),
                    })
                }
            }
        }
    }

    /// Egress tagging per §4.5: access ports strip the tag; trunk ports
    /// keep it unless it is the native VLAN.
    pub fn egress_vlan_tag(&self, vlan: u16) -> Option<u16> {
        match self.vlan_mode {
            VlanMode::Access => None,
            VlanMode::Trunk => {
                if vlan == self.native_vlan {
                    None
                } else {
                    Some(vlan)
                }
            }
        }
    }
}

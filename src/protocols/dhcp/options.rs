//! DHCP option catalogue and the wire-format encode/decode dance.
//! Grounded directly on the teacher's `core::message_type::DhcpOption` /
//! `DhcpOptions` — same TLV shape (`code, len, bytes`), same
//! `HashMap<u8, DhcpOption>`-backed container, trimmed to the options this
//! simulator's client/server/relay actually exchange (§4.10) plus a
//! catch-all so unknown codes still round-trip.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DhcpOption {
    Pad,
    End,
    SubnetMask(Vec<u8>),
    Router(Vec<u8>),
    DomainNameServer(Vec<u8>),
    RequestedIp(Vec<u8>),
    LeaseTime(Vec<u8>),
    MessageType(Vec<u8>),
    ServerIdentifier(Vec<u8>),
    ParameterRequestList(Vec<u8>),
    Message(Vec<u8>),
    ClientIdentifier(Vec<u8>),
    Other(u8, Vec<u8>),
}

impl DhcpOption {
    fn code(&self) -> u8 {
        use DhcpOption::*;
        match self {
            Pad => 0,
            SubnetMask(_) => 1,
            Router(_) => 3,
            DomainNameServer(_) => 6,
            RequestedIp(_) => 50,
            LeaseTime(_) => 51,
            MessageType(_) => 53,
            ServerIdentifier(_) => 54,
            ParameterRequestList(_) => 55,
            Message(_) => 56,
            ClientIdentifier(_) => 61,
            End => 255,
            Other(code, _) => *code,
        }
    }

    fn bytes(&self) -> Vec<u8> {
        use DhcpOption::*;
        match self {
            Pad | End => Vec::new(),
            SubnetMask(b) | Router(b) | DomainNameServer(b) | RequestedIp(b) | LeaseTime(b)
            | MessageType(b) | ServerIdentifier(b) | ParameterRequestList(b) | Message(b)
            | ClientIdentifier(b) | Other(_, b) => b.clone(),
        }
    }

    fn from_code(code: u8, bytes: Vec<u8>) -> Self {
        use DhcpOption::*;
        match code {
            0 => Pad,
            1 => SubnetMask(bytes),
            3 => Router(bytes),
            6 => DomainNameServer(bytes),
            50 => RequestedIp(bytes),
            51 => LeaseTime(bytes),
            53 => MessageType(bytes),
            54 => ServerIdentifier(bytes),
            55 => ParameterRequestList(bytes),
            56 => Message(bytes),
            61 => ClientIdentifier(bytes),
            255 => End,
            other => Other(other, bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl DhcpMessageType {
    fn as_u8(&self) -> u8 {
        match self {
            DhcpMessageType::Discover => 1,
            DhcpMessageType::Offer => 2,
            DhcpMessageType::Request => 3,
            DhcpMessageType::Decline => 4,
            DhcpMessageType::Ack => 5,
            DhcpMessageType::Nak => 6,
            DhcpMessageType::Release => 7,
            DhcpMessageType::Inform => 8,
        }
    }

    fn from_u8(n: u8) -> Option<Self> {
        Some(match n {
            1 => DhcpMessageType::Discover,
            2 => DhcpMessageType::Offer,
            3 => DhcpMessageType::Request,
            4 => DhcpMessageType::Decline,
            5 => DhcpMessageType::Ack,
            6 => DhcpMessageType::Nak,
            7 => DhcpMessageType::Release,
            8 => DhcpMessageType::Inform,
            _ => return None,
        })
    }
}

#[derive(Default, Debug, Clone)]
pub struct DhcpOptions {
    options: HashMap<u8, DhcpOption>,
}

impl DhcpOptions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.options.len()
    }

    pub fn add(&mut self, option: DhcpOption) {
        self.options.insert(option.code(), option);
    }

    pub fn is_defined_code(&self, code: u8) -> bool {
        self.options.contains_key(&code)
    }

    pub fn message_type(&self) -> Option<DhcpMessageType> {
        match self.options.get(&53) {
            Some(DhcpOption::MessageType(bytes)) => bytes.first().and_then(|b| DhcpMessageType::from_u8(*b)),
            _ => None,
        }
    }

    pub fn set_message_type(&mut self, kind: DhcpMessageType) {
        self.add(DhcpOption::MessageType(vec![kind.as_u8()]));
    }

    pub fn requested_ip(&self) -> Option<[u8; 4]> {
        match self.options.get(&50) {
            Some(DhcpOption::RequestedIp(bytes)) if bytes.len() == 4 => Some([bytes[0], bytes[1], bytes[2], bytes[3]]),
            _ => None,
        }
    }

    pub fn server_identifier(&self) -> Option<[u8; 4]> {
        match self.options.get(&54) {
            Some(DhcpOption::ServerIdentifier(bytes)) if bytes.len() == 4 => {
                Some([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
            _ => None,
        }
    }
}

impl From<DhcpOptions> for Vec<u8> {
    fn from(value: DhcpOptions) -> Self {
        let mut buf = Vec::new();
        for option in value.options.into_values() {
            if matches!(option, DhcpOption::Pad) {
                buf.push(0);
                continue;
            }
            let bytes = option.bytes();
            buf.push(option.code());
            buf.push(bytes.len() as u8);
            buf.extend(bytes);
        }
        buf.push(255);
        buf
    }
}

impl From<Vec<u8>> for DhcpOptions {
    fn from(mut data: Vec<u8>) -> Self {
        let mut options = DhcpOptions::empty();
        while !data.is_empty() {
            let code = data.remove(0);
            if code == 0 {
                continue;
            }
            if code == 255 {
                break;
            }
            if data.is_empty() {
                break;
            }
            let len = data.remove(0) as usize;
            if len > data.len() {
                break;
            }
            let value = data.drain(0..len).collect();
            options.add(DhcpOption::from_code(code, value));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_through_bytes() {
        let mut options = DhcpOptions::empty();
        options.set_message_type(DhcpMessageType::Offer);
        options.add(DhcpOption::RequestedIp(vec![192, 168, 1, 10]));

        let bytes: Vec<u8> = options.into();
        let decoded = DhcpOptions::from(bytes);
        assert_eq!(decoded.message_type(), Some(DhcpMessageType::Offer));
        assert_eq!(decoded.requested_ip(), Some([192, 168, 1, 10]));
    }
}

//! ICMP Echo Request/Reply, correlated by `(identifier, sequence)` with a
//! scheduler-driven timeout. Grounded on §4.8; uses the same internet
//! checksum as IPv4 (`protocols::ipv4::internet_checksum`).

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::oneshot;

use crate::protocols::ipv4::internet_checksum;
use crate::scheduler::{CancelHandle, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoRequest,
    EchoReply,
    TimeExceeded,
}

impl IcmpType {
    fn type_code(&self) -> u8 {
        match self {
            IcmpType::EchoRequest => 8,
            IcmpType::EchoReply => 0,
            IcmpType::TimeExceeded => 11,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IcmpMessage {
    pub kind: IcmpType,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
    pub checksum: u16,
}

impl IcmpMessage {
    pub fn build(kind: IcmpType, identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        let mut bytes = vec![kind.type_code(), 0, 0, 0];
        bytes.extend_from_slice(&identifier.to_be_bytes());
        bytes.extend_from_slice(&sequence.to_be_bytes());
        bytes.extend_from_slice(&payload);
        let checksum = internet_checksum(bytes.into_iter());
        Self { kind, identifier, sequence, payload, checksum }
    }

    pub fn echo_reply_to(request: &IcmpMessage) -> Self {
        Self::build(IcmpType::EchoReply, request.identifier, request.sequence, request.payload.clone())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.kind.type_code(), 0];
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes.extend_from_slice(&self.identifier.to_be_bytes());
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }
        let kind = match bytes[0] {
            8 => IcmpType::EchoRequest,
            0 => IcmpType::EchoReply,
            11 => IcmpType::TimeExceeded,
            _ => return None,
        };
        let identifier = u16::from_be_bytes([bytes[4], bytes[5]]);
        let sequence = u16::from_be_bytes([bytes[6], bytes[7]]);
        Some(Self::build(kind, identifier, sequence, bytes[8..].to_vec()))
    }
}

/// Tracks in-flight echo requests awaiting a reply, keyed by identifier.
#[derive(Default)]
pub struct EchoTracker {
    pending: HashMap<u16, oneshot::Sender<Option<IcmpMessage>>>,
}

impl EchoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks a random identifier, registers a waiter, and arms a timeout
    /// that resolves to `None` if no reply arrives in time. Returns the
    /// identifier to stamp on the outgoing request, the future the caller
    /// awaits, and the timeout's cancel handle (cancel it if a reply
    /// arrives first, via [`EchoTracker::complete`]).
    pub fn track(
        tracker: &std::rc::Rc<std::cell::RefCell<Self>>,
        scheduler: &Scheduler,
        timeout: f64,
    ) -> (u16, oneshot::Receiver<Option<IcmpMessage>>, CancelHandle) {
        let identifier = rand::thread_rng().gen::<u16>();
        let (tx, rx) = oneshot::channel();
        tracker.borrow_mut().pending.insert(identifier, tx);

        let weak = std::rc::Rc::downgrade(tracker);
        let handle = scheduler.delay(timeout, move || {
            if let Some(tracker) = weak.upgrade() {
                tracker.borrow_mut().expire(identifier);
            }
        });
        (identifier, rx, handle)
    }

    /// Delivers a reply to the waiter for `reply.identifier`, if any.
    pub fn complete(&mut self, reply: IcmpMessage) {
        if let Some(tx) = self.pending.remove(&reply.identifier) {
            let _ = tx.send(Some(reply));
        }
    }

    pub fn expire(&mut self, identifier: u16) {
        if let Some(tx) = self.pending.remove(&identifier) {
            let _ = tx.send(None);
        }
    }
}

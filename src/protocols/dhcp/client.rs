//! DHCP client negotiation state machine: DISCOVER → OFFER → REQUEST →
//! ACK, with exponential-backoff retry bounded at a fixed count. Grounded
//! on §4.10; retries ride the scheduler the same way ARP/ICMP timeouts do.

use crate::addresses::{IPv4Address, IPv4Mask};
use crate::scheduler::CancelHandle;

const MAX_RETRIES: u32 = 5;
const INITIAL_TIMEOUT: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStage {
    Idle,
    AwaitingOffer,
    AwaitingAck,
    Bound,
    Failed,
}

pub struct DhcpClientState {
    pub xid: u32,
    pub stage: NegotiationStage,
    pub retries: u32,
    pub lease: Option<(IPv4Address, IPv4Mask, Option<IPv4Address>)>,
    pub server_id: Option<IPv4Address>,
    retry_handle: Option<CancelHandle>,
}

impl DhcpClientState {
    pub fn new(xid: u32) -> Self {
        Self { xid, stage: NegotiationStage::Idle, retries: 0, lease: None, server_id: None, retry_handle: None }
    }

    pub fn set_retry_handle(&mut self, handle: CancelHandle) {
        if let Some(old) = self.retry_handle.take() {
            old.cancel();
        }
        self.retry_handle = Some(handle);
    }

    /// The next retry timeout, exponential backoff from `INITIAL_TIMEOUT`,
    /// bounded at `MAX_RETRIES` attempts before the negotiation fails.
    pub fn next_timeout(&mut self) -> Option<f64> {
        if self.retries >= MAX_RETRIES {
            self.stage = NegotiationStage::Failed;
            return None;
        }
        let timeout = INITIAL_TIMEOUT * 2f64.powi(self.retries as i32);
        self.retries += 1;
        Some(timeout)
    }

    pub fn apply_lease(&mut self, address: IPv4Address, mask: IPv4Mask, gateway: Option<IPv4Address>, server_id: IPv4Address) {
        self.lease = Some((address, mask, gateway));
        self.server_id = Some(server_id);
        self.stage = NegotiationStage::Bound;
        self.retries = 0;
        if let Some(handle) = self.retry_handle.take() {
            handle.cancel();
        }
    }

    pub fn release(&mut self) {
        self.lease = None;
        self.server_id = None;
        self.stage = NegotiationStage::Idle;
        if let Some(handle) = self.retry_handle.take() {
            handle.cancel();
        }
    }
}

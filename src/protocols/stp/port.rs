//! Per-port role/state machine: Disabled → Blocking → Listening →
//! Learning → Forwarding, driven by the spanning tree's periodic
//! recompute and the forward-delay timer. Grounded on §4.9 and the
//! teacher's `core::state_switcher` pattern for explicit state-transition
//! guards.

use super::bpdu::PortRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Disabled,
    Blocking,
    Listening,
    Learning,
    Forwarding,
}

impl PortState {
    /// Whether frames arriving on a port in this state may be learned
    /// into the MAC table.
    pub fn learns(&self) -> bool {
        matches!(self, PortState::Learning | PortState::Forwarding)
    }

    /// Whether frames may be forwarded out a port in this state.
    pub fn forwards(&self) -> bool {
        matches!(self, PortState::Forwarding)
    }
}

pub struct PortEntry {
    pub role: PortRole,
    pub state: PortState,
    pub cost: u32,
    pub edge: bool,
    pub rapid: bool,
    /// First `tick` timestamp this port was seen at, i.e. when it came
    /// up. `None` until the first tick. Drives RSTP's edge auto-detect:
    /// a port still waiting on its first BPDU `EDGE_AUTODETECT_SECONDS`
    /// after coming up is assumed to have no switch on the other end.
    pub up_since: Option<f64>,
    time_in_state: f64,
}

impl PortEntry {
    /// Starts `Disabled`/`Blocking` so the first `set_role` call from
    /// election always runs its transition, even when that first result
    /// happens to be Designated again.
    pub fn new(cost: u32) -> Self {
        Self { role: PortRole::Disabled, state: PortState::Blocking, cost, edge: false, rapid: false, up_since: None, time_in_state: 0.0 }
    }

    pub fn set_role(&mut self, role: PortRole, now: f64) {
        if self.role == role {
            return;
        }
        self.role = role;
        let next_state = match role {
            PortRole::Disabled | PortRole::Alternate | PortRole::Backup => PortState::Blocking,
            PortRole::Root | PortRole::Designated => {
                if self.rapid && self.edge {
                    PortState::Forwarding
                } else {
                    PortState::Listening
                }
            }
        };
        self.transition_to(next_state, now);
    }

    fn transition_to(&mut self, state: PortState, now: f64) {
        self.state = state;
        self.time_in_state = now;
    }

    /// Marks the port edge (RSTP auto-detect or manual `set_edge`) and, if
    /// its role already forwards, jumps it straight to `Forwarding` since
    /// `set_role` only runs that transition on a role *change* and an
    /// already-Designated/Root port's role won't change just because it
    /// turned out to be an edge port.
    pub(crate) fn mark_edge(&mut self, now: f64) {
        self.edge = true;
        self.rapid = true;
        if matches!(self.role, PortRole::Root | PortRole::Designated) {
            self.transition_to(PortState::Forwarding, now);
        }
    }

    /// Advances Listening → Learning → Forwarding once `forward_delay`
    /// has elapsed in the current state, for roles that are allowed to
    /// forward. RSTP edge ports skip straight to Forwarding via
    /// `set_role` and never need this tick.
    pub fn tick_forward_delay(&mut self, now: f64, forward_delay: f64) {
        if !matches!(self.role, PortRole::Root | PortRole::Designated) {
            return;
        }
        if now - self.time_in_state < forward_delay {
            return;
        }
        let next = match self.state {
            PortState::Listening => Some(PortState::Learning),
            PortState::Learning => Some(PortState::Forwarding),
            _ => None,
        };
        if let Some(next) = next {
            self.transition_to(next, now);
        }
    }
}

//! The three node kinds a topology is built from. Grounded on §4.11;
//! composition follows the teacher's `core::pfe` pattern of a thin
//! enum wrapping focused per-role structs rather than one god object.

pub mod host;
pub mod router;
pub mod switch;

pub use host::Host;
pub use router::Router;
pub use switch::Switch;

/// A node in the topology arena. `Network` (§9) owns these by `NodeId`
/// and dispatches inbound frames/datagrams to whichever variant applies.
pub enum Node {
    Host(Host),
    Router(Router),
    Switch(Switch),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Host(h) => &h.name,
            Node::Router(r) => &r.name,
            Node::Switch(s) => &s.name,
        }
    }
}

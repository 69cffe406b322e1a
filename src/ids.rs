//! Arena handles used in place of the shared/cyclic pointers the source
//! topology implies (node ↔ interface ↔ link ↔ listener back-references).
//! Per the Design Notes: nodes and links live in arenas owned by
//! [`crate::network::Network`]; everything else refers to them by id.

use std::fmt;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl nohash_hasher::IsEnabled for $name {}

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(NodeId);
arena_id!(InterfaceId);
arena_id!(LinkId);

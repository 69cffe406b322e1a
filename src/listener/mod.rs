//! The polymorphic listener chain: every layer (physical, data link,
//! network, and plain events) dispatches through the same `Outcome`
//! severity rule. Grounded on the teacher's `hooks::hook_registry`
//! (`run_hooks`'s ordered, short-circuiting loop) generalized from a
//! dependency-DAG over `Hook`s into the specification's simpler
//! registration-order chain with a three-value severity outcome instead
//! of a success/failure exit code.

use std::fmt;

/// The result a listener returns from one invocation of the chain.
/// Declared in severity order so `#[derive(Ord)]` gives the specified
/// `Continue < Handled < Stop` rule for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Continue,
    Handled,
    Stop,
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Continue
    }
}

/// Identifies a registered listener so the chain can skip the sender of
/// the message it is dispatching (a component never re-processes its own
/// traffic) and so callers can unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// An ordered set of listeners for one message type `M`. Each layer
/// (hardware interface, network interface, link, node) owns one of
/// these per direction it dispatches (`send_bits`/`receive_bits`, etc.).
pub struct ListenerChain<M> {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn FnMut(&M) -> Outcome>)>,
}

impl<M> Default for ListenerChain<M> {
    fn default() -> Self {
        Self { next_id: 0, listeners: Vec::new() }
    }
}

impl<M> ListenerChain<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener, run in registration order by `handle_chain`.
    pub fn register(&mut self, listener: impl FnMut(&M) -> Outcome + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Idempotent: unregistering an id that isn't present is a no-op.
    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Walks every listener except `skip` (the sender, if it is itself a
    /// registered listener on this chain) in registration order, and
    /// returns the maximum-severity `Outcome` observed. A `Stop` halts
    /// the walk immediately.
    pub fn handle_chain(&mut self, message: &M, skip: Option<ListenerId>) -> Outcome {
        let mut outcome = Outcome::Continue;
        for (id, listener) in self.listeners.iter_mut() {
            if Some(*id) == skip {
                continue;
            }
            let result = listener(message);
            if result > outcome {
                outcome = result;
            }
            if outcome == Outcome::Stop {
                break;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_in_registration_order_and_skips_sender() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut chain: ListenerChain<u32> = ListenerChain::new();

        let o1 = order.clone();
        let sender = chain.register(move |_| {
            o1.borrow_mut().push("sender");
            Outcome::Continue
        });
        let o2 = order.clone();
        chain.register(move |_| {
            o2.borrow_mut().push("a");
            Outcome::Continue
        });
        let o3 = order.clone();
        chain.register(move |_| {
            o3.borrow_mut().push("b");
            Outcome::Handled
        });

        let outcome = chain.handle_chain(&42, Some(sender));
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(outcome, Outcome::Handled);
    }

    #[test]
    fn stop_halts_the_chain() {
        let mut chain: ListenerChain<u32> = ListenerChain::new();
        let ran_after_stop = Rc::new(RefCell::new(false));

        chain.register(|_| Outcome::Stop);
        let flag = ran_after_stop.clone();
        chain.register(move |_| {
            *flag.borrow_mut() = true;
            Outcome::Continue
        });

        let outcome = chain.handle_chain(&0, None);
        assert_eq!(outcome, Outcome::Stop);
        assert!(!*ran_after_stop.borrow());
    }

    #[test]
    fn severity_ordering_picks_the_maximum() {
        let mut chain: ListenerChain<u32> = ListenerChain::new();
        chain.register(|_| Outcome::Continue);
        chain.register(|_| Outcome::Handled);
        chain.register(|_| Outcome::Continue);
        assert_eq!(chain.handle_chain(&0, None), Outcome::Handled);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut chain: ListenerChain<u32> = ListenerChain::new();
        let id = chain.register(|_| Outcome::Continue);
        chain.unregister(id);
        chain.unregister(id);
        assert!(chain.is_empty());
    }
}

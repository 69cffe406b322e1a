//! A point-to-point segment between two hardware interfaces, with one FIFO
//! transmission queue per direction. Grounded on the teacher's
//! `netio::netoutput` (the "one send at a time, then hand off" pattern),
//! replacing the spawn-a-task-per-send approach with scheduler-timed
//! delivery so ordering stays deterministic under virtual time.

use crate::hardware_interface::Duplex;
use crate::ids::InterfaceId;
use crate::listener::{ListenerChain, ListenerId, Outcome};
use crate::messages::DatalinkMessage;
use crate::scheduler::Scheduler;

/// Events a [`LinkLayerSpy`] (packet-capture tap, §6) observes.
#[derive(Clone)]
pub enum LinkEvent {
    SendBits { message: DatalinkMessage, source: InterfaceId, destination: InterfaceId, delay: f64 },
    ReceiveBits { message: DatalinkMessage, source: InterfaceId, destination: InterfaceId },
}

/// Tracks the next time each direction's single lane becomes free, so
/// back-to-back sends serialise rather than overlap.
#[derive(Default)]
struct DirectionQueue {
    busy_until: f64,
}

impl DirectionQueue {
    fn reserve(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.busy_until.max(now);
        self.busy_until = start + duration;
        start
    }
}

pub struct Link {
    iface_a: InterfaceId,
    iface_b: InterfaceId,
    length_m: f64,
    queue_ab: DirectionQueue,
    queue_ba: DirectionQueue,
    /// The single lane a half-duplex interface's sends are serialized
    /// through, since it cannot transmit and receive at once: unlike
    /// `queue_ab`/`queue_ba`, this one lane is shared by both directions.
    half_duplex_queue: DirectionQueue,
    spies: ListenerChain<LinkEvent>,
}

impl Link {
    pub fn new(iface_a: InterfaceId, iface_b: InterfaceId, length_m: f64) -> Self {
        Self {
            iface_a,
            iface_b,
            length_m,
            queue_ab: DirectionQueue::default(),
            queue_ba: DirectionQueue::default(),
            half_duplex_queue: DirectionQueue::default(),
            spies: ListenerChain::new(),
        }
    }

    pub fn endpoints(&self) -> (InterfaceId, InterfaceId) {
        (self.iface_a, self.iface_b)
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn other_end(&self, from: InterfaceId) -> Option<InterfaceId> {
        if from == self.iface_a {
            Some(self.iface_b)
        } else if from == self.iface_b {
            Some(self.iface_a)
        } else {
            None
        }
    }

    /// Registers a [`LinkLayerSpy`]-style observer; returns an unsubscribe
    /// handle per §6.
    pub fn add_spy(&mut self, spy: impl FnMut(&LinkEvent) -> Outcome + 'static) -> ListenerId {
        self.spies.register(spy)
    }

    pub fn remove_spy(&mut self, id: ListenerId) {
        self.spies.unregister(id);
    }

    /// Enqueues a transmission from `source` (one of our two endpoints),
    /// carrying `message` at `source_speed_mbps`. `on_deliver` is invoked
    /// by the scheduler's pump at the computed delivery time with the
    /// destination interface id and the message, mirroring the
    /// `send_bits` → wait `delay` → `receive_bits` pipeline in §4.4.
    /// `duplex` is the sending interface's duplex setting: full-duplex
    /// sends serialize only against same-direction traffic (`queue_ab`/
    /// `queue_ba`), while a half-duplex interface can't transmit and
    /// receive at once, so its sends serialize against traffic in
    /// *either* direction through `half_duplex_queue`.
    #[allow(clippy::too_many_arguments)]
    pub fn send(
        &mut self,
        scheduler: &Scheduler,
        source: InterfaceId,
        message: DatalinkMessage,
        source_speed_mbps: u32,
        duplex: Duplex,
        on_deliver: impl FnOnce(InterfaceId, InterfaceId, DatalinkMessage) + 'static,
    ) -> Result<(), crate::errors::SimError> {
        let destination = self.other_end(source).ok_or(crate::errors::SimError::LinkNotConnected)?;

        let propagation = scheduler.propagation_delay(self.length_m);
        let transmission = scheduler.transmission_delay(message.wire_length() as u64, source_speed_mbps);
        let delay = propagation + transmission;

        self.spies.handle_chain(
            &LinkEvent::SendBits {
                message: message.clone(),
                source,
                destination,
                delay,
            },
            None,
        );

        let queue = match duplex {
            Duplex::Full => {
                if source == self.iface_a {
                    &mut self.queue_ab
                } else {
                    &mut self.queue_ba
                }
            }
            Duplex::Half => &mut self.half_duplex_queue,
        };
        let now = scheduler.delta_time();
        let start = queue.reserve(now, transmission);
        // Delivery happens `delay` after send is initiated; serialisation
        // only staggers when transmission of the *next* frame may begin.
        let wait = (start - now) + delay;

        if delay.is_infinite() {
            // Paused speed mode: transmission never completes.
            return Ok(());
        }

        let _handle = scheduler.delay(wait, move || {
            on_deliver(source, destination, message);
        });
        Ok(())
    }

    /// Called by the receiving side once a frame has finished its
    /// propagation/transmission delay, so spies see `receive_bits` too.
    pub fn notify_receive(&mut self, message: &DatalinkMessage, source: InterfaceId, destination: InterfaceId) -> Outcome {
        self.spies.handle_chain(
            &LinkEvent::ReceiveBits { message: message.clone(), source, destination },
            None,
        )
    }
}

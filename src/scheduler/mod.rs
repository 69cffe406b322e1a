//! The virtual-time scheduler: a single-threaded, cooperative priority
//! queue of delayed actions. Nothing in this module sleeps on a wall-clock
//! timer; `run_until_idle`/`advance_to` are the only sources of progress.
//!
//! Grounded on the teacher's task-spawning style in `core::state_switcher`
//! and `netio`, generalized from "spawn a tokio task per packet" into the
//! single scheduler singleton the specification's Design Notes call for.
//! `tokio::sync::oneshot` channels back the awaitable timers so protocol
//! code reads as ordinary `async fn`, even though the pump resolves them
//! synchronously at the virtual time the caller asked for.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Speed of light times the 2/3 velocity factor typical of copper/fibre,
/// used for propagation delay (`length / (c * 2/3)`).
const PROPAGATION_VELOCITY_M_PER_S: f64 = 299_792_458.0 * 2.0 / 3.0;

thread_local! {
    // Mirrors the `now` of whichever `Scheduler` last fired an event on
    // this thread, so `utils::logger`'s format string can stamp log lines
    // with virtual time without the logging stack needing a handle to the
    // scheduler itself. The simulator is single-threaded by construction
    // (`SPEC_FULL.md` §5), so one cell per thread is exactly one cell.
    static CURRENT_VIRTUAL_TIME: std::cell::Cell<f64> = std::cell::Cell::new(0.0);
}

/// The virtual time of the most recently fired event, for log formatting.
pub fn current_virtual_time() -> f64 {
    CURRENT_VIRTUAL_TIME.with(|c| c.get())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Paused,
    Slower,
    Normal,
    Faster,
}

impl Default for Speed {
    fn default() -> Self {
        Speed::Normal
    }
}

/// Construction-time knobs the specification allows to be configured
/// in-memory (no file/env ingestion — see `SPEC_FULL.md` §10.3).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub initial_speed: Speed,
    pub transmission_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { initial_speed: Speed::Normal, transmission_factor: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeKey(f64);

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

type EventId = u64;

enum Action {
    Once(oneshot::Sender<()>),
    Repeat { callback: Box<dyn FnMut()>, period: f64 },
}

struct QueueEntry {
    time: TimeKey,
    seq: u64,
    id: EventId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Reversed so `BinaryHeap` (a max-heap) pops the earliest time, and
    // ties break on insertion order (FIFO at equal virtual time).
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    now: f64,
    heap: BinaryHeap<QueueEntry>,
    actions: HashMap<EventId, Action>,
    cancelled: HashSet<EventId>,
    next_id: EventId,
    next_seq: u64,
    speed: Speed,
    transmission_factor: f64,
}

/// The scheduler singleton. Cloning shares the same queue (`Rc`); it is
/// deliberately not `Send`/`Sync` — see `SPEC_FULL.md` §5.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

/// An opaque, idempotent cancellation token returned by `once`/`repeat`.
#[derive(Clone)]
pub struct CancelHandle {
    id: EventId,
    inner: Weak<RefCell<Inner>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.borrow_mut();
            inner.cancelled.insert(self.id);
            inner.actions.remove(&self.id);
        }
    }
}

/// A `Future` resolved by the scheduler's pump at a specific virtual time.
pub struct Timer {
    receiver: oneshot::Receiver<()>,
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                now: 0.0,
                heap: BinaryHeap::new(),
                actions: HashMap::new(),
                cancelled: HashSet::new(),
                next_id: 0,
                next_seq: 0,
                speed: config.initial_speed,
                transmission_factor: config.transmission_factor,
            })),
        }
    }

    pub fn delta_time(&self) -> f64 {
        self.inner.borrow().now
    }

    pub fn speed(&self) -> Speed {
        self.inner.borrow().speed
    }

    pub fn set_speed(&self, speed: Speed) {
        self.inner.borrow_mut().speed = speed;
    }

    fn enqueue(&self, delay: f64, action: Action) -> EventId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.actions.insert(id, action);
        drop(inner);
        self.push_entry(id, delay);
        id
    }

    /// Schedules `delay` seconds from now a new occurrence of the event
    /// identified by `id`, whose `Action` is already (re-)installed in
    /// `actions`. Keeping the same id lets a `CancelHandle` stay valid
    /// across a repeating timer's reschedules.
    fn push_entry(&self, id: EventId, delay: f64) {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let time = TimeKey(inner.now + delay.max(0.0));
        inner.heap.push(QueueEntry { time, seq, id });
    }

    /// Returns a future that resolves after `delay` virtual seconds, plus
    /// a handle to cancel it before it fires.
    pub fn once(&self, delay: f64) -> (Timer, CancelHandle) {
        let (tx, rx) = oneshot::channel();
        let id = self.enqueue(delay, Action::Once(tx));
        let handle = CancelHandle { id, inner: Rc::downgrade(&self.inner) };
        (Timer { receiver: rx }, handle)
    }

    /// Same as [`Scheduler::once`] but the caller supplies a synchronous
    /// callback instead of awaiting a future — used by timer-driven
    /// subsystems (ARP aging, STP hello, reassembly purge) that don't
    /// need to suspend an async task.
    pub fn delay(&self, delay: f64, callback: impl FnOnce() + 'static) -> CancelHandle {
        let mut once_cell = Some(callback);
        let action = Action::Repeat {
            callback: Box::new(move || {
                if let Some(cb) = once_cell.take() {
                    cb();
                }
            }),
            period: f64::INFINITY,
        };
        let id = self.enqueue(delay, action);
        CancelHandle { id, inner: Rc::downgrade(&self.inner) }
    }

    /// Registers `callback` to run every `period` virtual seconds,
    /// starting at `now + period`, until the returned handle is cancelled.
    pub fn repeat(&self, period: f64, callback: impl FnMut() + 'static) -> CancelHandle {
        let id = self.enqueue(period, Action::Repeat { callback: Box::new(callback), period });
        CancelHandle { id, inner: Rc::downgrade(&self.inner) }
    }

    /// Propagation delay for a link of the given length, per spec: fixed
    /// `c * 2/3` signal velocity.
    pub fn propagation_delay(&self, length_m: f64) -> f64 {
        length_m / PROPAGATION_VELOCITY_M_PER_S
    }

    /// Transmission delay for `bytes` at `speed_mbps`, speed-mode dependent.
    pub fn transmission_delay(&self, bytes: u64, speed_mbps: u32) -> f64 {
        let inner = self.inner.borrow();
        match inner.speed {
            Speed::Paused => f64::INFINITY,
            Speed::Slower => {
                let bytes = (bytes.max(1)) as f64;
                let speed = (speed_mbps.max(1)) as f64;
                bytes.log2() / speed.log10() / 10.0
            }
            Speed::Normal | Speed::Faster => {
                let factor = match inner.speed {
                    Speed::Faster => inner.transmission_factor * 4.0,
                    _ => inner.transmission_factor,
                };
                (bytes as f64) / ((speed_mbps as f64) * 1_000_000.0 * factor)
            }
        }
    }

    /// Drains the queue completely, advancing virtual time to each event
    /// in turn. Handlers that enqueue further events (at strictly later
    /// times, per the concurrency contract) are picked up in the same pump.
    pub fn run_until_idle(&self) {
        loop {
            let next = self.inner.borrow_mut().heap.pop();
            let entry = match next {
                Some(e) => e,
                None => break,
            };
            self.fire(entry);
        }
    }

    /// Runs every event scheduled at or before `target`, advancing `now`
    /// to `target` even if nothing was pending exactly at that time.
    pub fn advance_to(&self, target: f64) {
        loop {
            let due = {
                let inner = self.inner.borrow();
                inner.heap.peek().map(|e| e.time.0 <= target).unwrap_or(false)
            };
            if !due {
                break;
            }
            let entry = self.inner.borrow_mut().heap.pop().expect("checked peek above");
            self.fire(entry);
        }
        let mut inner = self.inner.borrow_mut();
        if inner.now < target {
            inner.now = target;
            CURRENT_VIRTUAL_TIME.with(|c| c.set(inner.now));
        }
    }

    fn fire(&self, entry: QueueEntry) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.now = entry.time.0;
            CURRENT_VIRTUAL_TIME.with(|c| c.set(inner.now));
            if inner.cancelled.remove(&entry.id) {
                inner.actions.remove(&entry.id);
                return;
            }
        }
        let action = self.inner.borrow_mut().actions.remove(&entry.id);
        match action {
            Some(Action::Once(tx)) => {
                let _ = tx.send(());
            }
            Some(Action::Repeat { mut callback, period }) => {
                callback();
                if period.is_finite() {
                    // Re-arm under the same id so the original CancelHandle
                    // stays valid across reschedules.
                    self.inner
                        .borrow_mut()
                        .actions
                        .insert(entry.id, Action::Repeat { callback, period });
                    self.push_entry(entry.id, period);
                }
            }
            None => {}
        }
    }

    pub fn is_idle(&self) -> bool {
        self.inner.borrow().heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn events_fire_in_time_order() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let log = StdRc::new(StdRefCell::new(Vec::new()));

        let l1 = log.clone();
        sched.delay(3.0, move || l1.borrow_mut().push("c"));
        let l2 = log.clone();
        sched.delay(1.0, move || l2.borrow_mut().push("a"));
        let l3 = log.clone();
        sched.delay(2.0, move || l3.borrow_mut().push("b"));

        sched.run_until_idle();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(sched.delta_time(), 3.0);
    }

    #[test]
    fn equal_time_events_are_fifo() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let log = StdRc::new(StdRefCell::new(Vec::new()));

        let l1 = log.clone();
        sched.delay(1.0, move || l1.borrow_mut().push(1));
        let l2 = log.clone();
        sched.delay(1.0, move || l2.borrow_mut().push(2));
        let l3 = log.clone();
        sched.delay(1.0, move || l3.borrow_mut().push(3));

        sched.run_until_idle();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn cancellation_prevents_execution() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let fired = StdRc::new(StdRefCell::new(false));
        let f = fired.clone();
        let handle = sched.delay(1.0, move || *f.borrow_mut() = true);
        handle.cancel();
        sched.run_until_idle();
        assert!(!*fired.borrow());
    }

    #[test]
    fn cancel_is_idempotent() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let handle = sched.delay(1.0, || {});
        handle.cancel();
        handle.cancel();
        sched.run_until_idle();
    }

    #[tokio::test]
    async fn once_future_resolves_through_pump() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let (timer, _handle) = sched.once(5.0);
        sched.run_until_idle();
        timer.await;
        assert_eq!(sched.delta_time(), 5.0);
    }

    #[test]
    fn paused_speed_has_infinite_transmission_delay() {
        let sched = Scheduler::new(SchedulerConfig::default());
        sched.set_speed(Speed::Paused);
        assert!(sched.transmission_delay(1500, 100).is_infinite());
    }

    #[test]
    fn advance_to_stops_at_target() {
        let sched = Scheduler::new(SchedulerConfig::default());
        let log = StdRc::new(StdRefCell::new(Vec::new()));
        let l1 = log.clone();
        sched.delay(1.0, move || l1.borrow_mut().push(1));
        let l2 = log.clone();
        sched.delay(5.0, move || l2.borrow_mut().push(2));

        sched.advance_to(2.0);
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(sched.delta_time(), 2.0);

        sched.advance_to(10.0);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }
}

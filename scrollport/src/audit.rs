use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::emitter::{EventBus, Subscription};

/// A time-window audit over an event stream.
///
/// The first event after an idle period opens a window of `window_ms`; later
/// events within the window replace the pending value. A [`AuditGate::tick`]
/// at or past the window deadline emits the latest pending value and returns
/// the gate to idle. A window of 0 emits on the next tick.
///
/// Time is host-provided: events and ticks both carry `now_ms`.
pub struct AuditGate<T> {
    window_ms: u64,
    pending: Option<T>,
    deadline: Option<u64>,
    output: EventBus<T>,
}

impl<T: 'static> AuditGate<T> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending: None,
            deadline: None,
            output: EventBus::new(),
        }
    }

    pub fn output(&self) -> EventBus<T> {
        self.output.clone()
    }

    pub fn push(&mut self, value: T, now_ms: u64) {
        self.pending = Some(value);
        if self.deadline.is_none() {
            self.deadline = Some(now_ms.saturating_add(self.window_ms));
        }
    }

    pub fn tick(&mut self, now_ms: u64) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if now_ms < deadline {
            return;
        }
        self.deadline = None;
        if let Some(value) = self.pending.take() {
            self.output.emit(&value);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.deadline.is_none() && self.pending.is_none()
    }
}

/// The gates of one stream owner, flushed together by its `tick(now_ms)`.
pub(crate) struct GatePool<T> {
    gates: Vec<Weak<RefCell<AuditGate<T>>>>,
}

impl<T: 'static> GatePool<T> {
    pub(crate) fn new() -> Self {
        Self { gates: Vec::new() }
    }

    pub(crate) fn adopt(&mut self, gate: &Rc<RefCell<AuditGate<T>>>) {
        self.gates.push(Rc::downgrade(gate));
    }

    /// Upgrades the live gates, pruning dropped ones.
    pub(crate) fn collect(&mut self) -> Vec<Rc<RefCell<AuditGate<T>>>> {
        let mut live = Vec::with_capacity(self.gates.len());
        self.gates.retain(|weak| match weak.upgrade() {
            Some(gate) => {
                live.push(gate);
                true
            }
            None => false,
        });
        live
    }
}

/// A live subscription to an audited (or direct) stream.
///
/// Holds the underlying bus registrations and, for audited streams, the gate
/// itself; dropping it tears the whole chain down.
pub struct AuditedSubscription<T> {
    _subscriptions: Vec<Subscription>,
    _gate: Option<Rc<RefCell<AuditGate<T>>>>,
}

impl<T> AuditedSubscription<T> {
    pub(crate) fn direct(subscription: Subscription) -> Self {
        Self {
            _subscriptions: vec![subscription],
            _gate: None,
        }
    }

    pub(crate) fn gated(
        subscriptions: Vec<Subscription>,
        gate: Rc<RefCell<AuditGate<T>>>,
    ) -> Self {
        Self {
            _subscriptions: subscriptions,
            _gate: Some(gate),
        }
    }
}

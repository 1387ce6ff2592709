use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::audit::{AuditGate, AuditedSubscription, GatePool};
use crate::emitter::{EventBus, Subscription};
use crate::types::{GeometryEvent, ViewportDimensions};

/// Default audit window for resize streams, in milliseconds.
pub const DEFAULT_RESIZE_AUDIT_MS: u64 = 20;

/// The external collaborator that can measure the viewport and report
/// resize/orientation-change events.
pub trait GeometrySource {
    fn measure(&self) -> ViewportDimensions;
    fn change_events(&self) -> EventBus<GeometryEvent>;
}

struct CacheState {
    source: Rc<dyn GeometrySource>,
    cached: Option<ViewportDimensions>,
    invalidated: EventBus<GeometryEvent>,
    source_subscription: Option<Subscription>,
    gates: GatePool<GeometryEvent>,
}

/// Caches viewport dimensions, invalidating on resize events.
///
/// The subscription to the source attaches lazily on first use and lives
/// until [`dispose`]. Repeated [`viewport_size`] calls between change events
/// return the cached measurement.
///
/// [`dispose`]: ViewportGeometryCache::dispose
/// [`viewport_size`]: ViewportGeometryCache::viewport_size
pub struct ViewportGeometryCache {
    state: Rc<RefCell<CacheState>>,
}

impl Clone for ViewportGeometryCache {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl ViewportGeometryCache {
    pub fn new(source: Rc<dyn GeometrySource>) -> Self {
        Self {
            state: Rc::new(RefCell::new(CacheState {
                source,
                cached: None,
                invalidated: EventBus::new(),
                source_subscription: None,
                gates: GatePool::new(),
            })),
        }
    }

    fn ensure_connected(&self) {
        if self.state.borrow().source_subscription.is_some() {
            return;
        }
        let events = self.state.borrow().source.change_events();
        let weak: Weak<RefCell<CacheState>> = Rc::downgrade(&self.state);
        let subscription = events.subscribe(move |event: &GeometryEvent| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let invalidated = {
                let mut state = state.borrow_mut();
                state.cached = None;
                state.invalidated.clone()
            };
            invalidated.emit(event);
        });
        self.state.borrow_mut().source_subscription = Some(subscription);
        sdebug!("ViewportGeometryCache: connected to geometry source");
    }

    /// The current viewport dimensions, measuring only when the cache is
    /// cold.
    pub fn viewport_size(&self) -> ViewportDimensions {
        self.ensure_connected();
        if let Some(cached) = self.state.borrow().cached {
            return cached;
        }
        let measured = self.state.borrow().source.measure();
        self.state.borrow_mut().cached = Some(measured);
        strace!(
            width = measured.width,
            height = measured.height,
            "ViewportGeometryCache: measured"
        );
        measured
    }

    pub fn is_cached(&self) -> bool {
        self.state.borrow().cached.is_some()
    }

    /// The invalidation stream. With `throttle_ms = Some(window)`, events
    /// pass through an audit window flushed by [`tick`].
    ///
    /// [`tick`]: ViewportGeometryCache::tick
    pub fn change(&self, throttle_ms: Option<u64>) -> GeometryStream {
        self.ensure_connected();
        GeometryStream {
            state: Rc::downgrade(&self.state),
            invalidated: self.state.borrow().invalidated.clone(),
            throttle_ms,
        }
    }

    /// Flushes audit windows whose deadline has passed.
    pub fn tick(&self, now_ms: u64) {
        let gates = self.state.borrow_mut().gates.collect();
        for gate in gates {
            gate.borrow_mut().tick(now_ms);
        }
    }

    /// Drops the source subscription and all change subscribers.
    pub fn dispose(&self) {
        let mut state = self.state.borrow_mut();
        state.source_subscription = None;
        state.cached = None;
        state.invalidated.close();
    }
}

/// A lazily subscribed view of the cache's invalidation stream.
pub struct GeometryStream {
    state: Weak<RefCell<CacheState>>,
    invalidated: EventBus<GeometryEvent>,
    throttle_ms: Option<u64>,
}

impl GeometryStream {
    pub fn subscribe(
        &self,
        callback: impl Fn(&GeometryEvent) + 'static,
    ) -> AuditedSubscription<GeometryEvent> {
        match self.throttle_ms {
            None => AuditedSubscription::direct(self.invalidated.subscribe(callback)),
            Some(window_ms) => {
                let gate = Rc::new(RefCell::new(AuditGate::new(window_ms)));
                if let Some(state) = self.state.upgrade() {
                    state.borrow_mut().gates.adopt(&gate);
                }
                let feeding = {
                    let gate = Rc::clone(&gate);
                    self.invalidated.subscribe(move |event: &GeometryEvent| {
                        gate.borrow_mut().push(*event, event.now_ms);
                    })
                };
                let delivering = gate.borrow().output().subscribe(callback);
                AuditedSubscription::gated(vec![feeding, delivering], gate)
            }
        }
    }
}

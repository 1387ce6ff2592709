use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::audit::{AuditGate, AuditedSubscription, GatePool};
use crate::emitter::{EventBus, Subscription};
use crate::scrollable::{ScrollNode, ScrollableSurface};
use crate::types::ScrollEvent;

/// Default audit window for aggregate scroll streams, in milliseconds.
pub const DEFAULT_SCROLL_AUDIT_MS: u64 = 20;

/// An event on the aggregate scroll stream.
///
/// `surface` is `None` when the global scroll target fired.
#[derive(Clone)]
pub struct Scrolled {
    pub surface: Option<Rc<dyn ScrollableSurface>>,
    pub now_ms: u64,
}

struct Registration {
    surface: Rc<dyn ScrollableSurface>,
    _subscription: Subscription,
}

struct HubState {
    registered: HashMap<u64, Registration>,
    relay: EventBus<Scrolled>,
    global_target: Option<Rc<dyn ScrollableSurface>>,
    global_subscription: Option<Subscription>,
    gates: GatePool<Scrolled>,
}

/// A process-wide registry of scrollable surfaces.
///
/// Each registered surface's scroll events are multiplexed into one aggregate
/// stream. The optional global scroll target gets exactly one listener,
/// attached lazily when the aggregate stream gains its first subscriber and
/// detached when the last one unsubscribes.
///
/// The hub is a shared handle: clone it and pass it to constructors instead
/// of relying on ambient state.
pub struct ScrollEventHub {
    state: Rc<RefCell<HubState>>,
}

impl Clone for ScrollEventHub {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl ScrollEventHub {
    pub fn new(global_target: Option<Rc<dyn ScrollableSurface>>) -> Self {
        let relay = EventBus::new();
        let state = Rc::new(RefCell::new(HubState {
            registered: HashMap::new(),
            relay: relay.clone(),
            global_target,
            global_subscription: None,
            gates: GatePool::new(),
        }));

        let attach_state = Rc::downgrade(&state);
        let detach_state = Rc::downgrade(&state);
        relay.set_lifecycle(
            move || attach_global_listener(&attach_state),
            move || detach_global_listener(&detach_state),
        );

        Self { state }
    }

    /// Registers a surface, multiplexing its scroll events into the
    /// aggregate stream. Idempotent per surface id.
    pub fn register(&self, surface: Rc<dyn ScrollableSurface>) {
        let id = surface.surface_id();
        if self.state.borrow().registered.contains_key(&id) {
            return;
        }
        sdebug!(surface_id = id, "ScrollEventHub::register");
        let relay = self.state.borrow().relay.clone();
        let forwarded = Rc::clone(&surface);
        let subscription = surface.element_scrolled().subscribe(move |event: &ScrollEvent| {
            relay.emit(&Scrolled {
                surface: Some(Rc::clone(&forwarded)),
                now_ms: event.now_ms,
            });
        });
        self.state.borrow_mut().registered.insert(
            id,
            Registration {
                surface,
                _subscription: subscription,
            },
        );
    }

    /// Removes a surface and unsubscribes from its events.
    pub fn deregister(&self, surface_id: u64) {
        let removed = self.state.borrow_mut().registered.remove(&surface_id);
        if removed.is_some() {
            sdebug!(surface_id, "ScrollEventHub::deregister");
        }
    }

    pub fn is_registered(&self, surface_id: u64) -> bool {
        self.state.borrow().registered.contains_key(&surface_id)
    }

    pub fn registered_count(&self) -> usize {
        self.state.borrow().registered.len()
    }

    /// The aggregate "any surface scrolled" stream.
    ///
    /// With `audit_ms = Some(window)`, events pass through an audit window
    /// flushed by [`tick`]; `None` delivers every event directly.
    ///
    /// [`tick`]: ScrollEventHub::tick
    pub fn scrolled(&self, audit_ms: Option<u64>) -> ScrolledStream {
        ScrolledStream {
            state: Rc::downgrade(&self.state),
            relay: self.state.borrow().relay.clone(),
            audit_ms,
            filter: None,
        }
    }

    /// Filters the aggregate stream to surfaces containing `node`.
    ///
    /// The ancestor set is computed by a parent-chain containment walk at
    /// call time, not cached; global-target events always pass.
    pub fn ancestor_scrolled(
        &self,
        node: &Rc<dyn ScrollNode>,
        audit_ms: Option<u64>,
    ) -> ScrolledStream {
        let ancestors = self.ancestor_surface_ids(node);
        let mut stream = self.scrolled(audit_ms);
        stream.filter = Some(Rc::new(move |event: &Scrolled| match &event.surface {
            None => true,
            Some(surface) => ancestors.contains(&surface.surface_id()),
        }));
        stream
    }

    /// Ids of the registered surfaces whose node is an ancestor (or self) of
    /// `node`.
    fn ancestor_surface_ids(&self, node: &Rc<dyn ScrollNode>) -> Vec<u64> {
        let mut chain = Vec::new();
        let mut current = Some(Rc::clone(node));
        while let Some(n) = current {
            chain.push(n.node_id());
            current = n.parent();
        }

        self.state
            .borrow()
            .registered
            .values()
            .filter(|registration| {
                registration
                    .surface
                    .scroll_node()
                    .is_some_and(|surface_node| chain.contains(&surface_node.node_id()))
            })
            .map(|registration| registration.surface.surface_id())
            .collect()
    }

    /// Flushes audit windows whose deadline has passed.
    pub fn tick(&self, now_ms: u64) {
        let gates = self.state.borrow_mut().gates.collect();
        for gate in gates {
            gate.borrow_mut().tick(now_ms);
        }
    }
}

fn attach_global_listener(state: &Weak<RefCell<HubState>>) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let (target, relay) = {
        let state = state.borrow();
        (state.global_target.clone(), state.relay.clone())
    };
    let Some(target) = target else {
        return;
    };
    sdebug!("ScrollEventHub: attaching global scroll listener");
    let subscription = target.element_scrolled().subscribe(move |event: &ScrollEvent| {
        relay.emit(&Scrolled {
            surface: None,
            now_ms: event.now_ms,
        });
    });
    state.borrow_mut().global_subscription = Some(subscription);
}

fn detach_global_listener(state: &Weak<RefCell<HubState>>) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let removed = state.borrow_mut().global_subscription.take();
    if removed.is_some() {
        sdebug!("ScrollEventHub: detaching global scroll listener");
    }
}

/// A lazily subscribed view of the hub's aggregate stream.
pub struct ScrolledStream {
    state: Weak<RefCell<HubState>>,
    relay: EventBus<Scrolled>,
    audit_ms: Option<u64>,
    filter: Option<Rc<dyn Fn(&Scrolled) -> bool>>,
}

impl ScrolledStream {
    pub fn subscribe(&self, callback: impl Fn(&Scrolled) + 'static) -> AuditedSubscription<Scrolled> {
        match self.audit_ms {
            None => {
                let filter = self.filter.clone();
                AuditedSubscription::direct(self.relay.subscribe(move |event: &Scrolled| {
                    if filter.as_ref().is_none_or(|f| f(event)) {
                        callback(event);
                    }
                }))
            }
            Some(window_ms) => {
                let gate = Rc::new(RefCell::new(AuditGate::new(window_ms)));
                if let Some(state) = self.state.upgrade() {
                    state.borrow_mut().gates.adopt(&gate);
                }
                let feeding = {
                    let gate = Rc::clone(&gate);
                    self.relay.subscribe(move |event: &Scrolled| {
                        gate.borrow_mut().push(event.clone(), event.now_ms);
                    })
                };
                let filter = self.filter.clone();
                let delivering = gate.borrow().output().subscribe(move |event: &Scrolled| {
                    if filter.as_ref().is_none_or(|f| f(event)) {
                        callback(event);
                    }
                });
                AuditedSubscription::gated(vec![feeding, delivering], gate)
            }
        }
    }
}

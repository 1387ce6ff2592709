use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct BusState<T> {
    next_id: u64,
    subscribers: Vec<(u64, Callback<T>)>,
    on_first_subscriber: Option<Rc<dyn Fn()>>,
    on_last_unsubscribed: Option<Rc<dyn Fn()>>,
    closed: bool,
}

/// A single-threaded event stream with reference-counted lifecycle hooks.
///
/// Subscribers are plain callbacks; a [`Subscription`] unsubscribes on drop.
/// The lifecycle hooks fire at the 0↔1 subscriber boundary so owners can
/// lazily attach (and detach) a real native listener only while someone is
/// listening.
///
/// Emission snapshots the subscriber list first, so callbacks may subscribe
/// or unsubscribe re-entrantly. Subscribers must not synchronously call back
/// into the emitting component; schedule follow-up work on a
/// [`crate::TaskQueue`] instead.
pub struct EventBus<T> {
    state: Rc<RefCell<BusState<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventBus<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                next_id: 0,
                subscribers: Vec::new(),
                on_first_subscriber: None,
                on_last_unsubscribed: None,
                closed: false,
            })),
        }
    }

    /// Installs the 0↔1 boundary hooks. Replaces any previous pair.
    pub fn set_lifecycle(
        &self,
        on_first_subscriber: impl Fn() + 'static,
        on_last_unsubscribed: impl Fn() + 'static,
    ) {
        let mut state = self.state.borrow_mut();
        state.on_first_subscriber = Some(Rc::new(on_first_subscriber));
        state.on_last_unsubscribed = Some(Rc::new(on_last_unsubscribed));
    }

    /// Registers `callback` and returns its RAII handle.
    ///
    /// Subscribing to a closed bus returns an inert handle.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let activated = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return Subscription { cancel: None };
            }
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.push((id, Rc::new(callback)));
            let hook = if state.subscribers.len() == 1 {
                state.on_first_subscriber.clone()
            } else {
                None
            };
            (id, hook)
        };
        let (id, hook) = activated;
        if let Some(hook) = hook {
            hook();
        }

        let weak = Rc::downgrade(&self.state);
        Subscription {
            cancel: Some(Box::new(move || unsubscribe(&weak, id))),
        }
    }

    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = {
            let state = self.state.borrow();
            if state.closed {
                return;
            }
            state.subscribers.iter().map(|(_, cb)| Rc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// Drops all subscribers and rejects future ones; emits become no-ops.
    /// Idempotent. The last-unsubscribed hook does not fire for a close.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

fn unsubscribe<T>(weak: &Weak<RefCell<BusState<T>>>, id: u64) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let hook = {
        let mut state = state.borrow_mut();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        if before > 0 && state.subscribers.is_empty() && !state.closed {
            state.on_last_unsubscribed.clone()
        } else {
            None
        }
    };
    if let Some(hook) = hook {
        hook();
    }
}

/// An active registration on an [`EventBus`]; unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
